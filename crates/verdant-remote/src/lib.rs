// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod client;
pub mod feed;
pub mod gate;
pub mod query;
pub mod remedies;
pub mod seasonal;
pub mod terms;

pub use client::*;
pub use feed::*;
pub use gate::*;
pub use query::*;
pub use remedies::*;
pub use seasonal::*;
pub use terms::*;
