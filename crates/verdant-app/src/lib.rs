// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod feed;
pub mod gate;
pub mod identity;
pub mod ids;
pub mod model;
pub mod season;
pub mod session;

pub use feed::*;
pub use gate::*;
pub use identity::*;
pub use ids::*;
pub use model::*;
pub use season::*;
pub use session::*;
