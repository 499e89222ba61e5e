// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use serde_json::json;
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use verdant_app::{
    AcceptanceRecord, IdentityProvider, LoadKind, PageRequest, Subject, resolve_subject,
};
use verdant_remote::{
    Backend, Query, RestClient, fetch_remedy_page, list_remedies, record_acceptance,
};
use verdant_testkit::MemoryKv;

fn header<'a>(request: &'a Request, name: &'static str) -> Option<&'a str> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str())
}

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn mock_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    Ok((server, addr))
}

#[test]
fn unreachable_host_error_names_the_config_key() {
    let client = RestClient::new("http://127.0.0.1:1", "anon", Duration::from_millis(50))
        .expect("client should initialize");
    let error = list_remedies(&client, None).expect_err("request should fail");
    let message = format!("{error:#}");
    assert!(message.contains("[remote].url"), "{message}");
    assert!(message.starts_with("list remedies"), "{message}");
}

#[test]
fn search_sends_postgrest_filters_and_auth_headers() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Get);
        let url = request.url().to_owned();
        assert!(url.starts_with("/rest/v1/remedies?select=id%2Cname"), "{url}");
        assert!(url.contains("order=name.asc"), "{url}");
        assert!(url.contains("ilike.*gin*"), "{url}");
        assert_eq!(header(&request, "apikey"), Some("anon-key"));
        assert_eq!(header(&request, "Authorization"), Some("Bearer anon-key"));
        assert_eq!(header(&request, "Prefer"), None);

        let body = r#"[{"id":2,"name":"Ginger","description":"Warming rhizome","uses":"Nausea, Digestion"}]"#;
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = RestClient::new(&addr, "anon-key", Duration::from_secs(1))?;
    let remedies = list_remedies(&client, Some(" gin "))?;
    assert_eq!(remedies.len(), 1);
    assert_eq!(remedies[0].name, "Ginger");
    assert_eq!(remedies[0].uses, vec!["Nausea", "Digestion"]);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn page_requests_read_total_from_content_range() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        let url = request.url().to_owned();
        assert!(url.contains("offset=30"), "{url}");
        assert!(url.contains("limit=30"), "{url}");
        assert_eq!(header(&request, "Prefer"), Some("count=exact"));

        let response = json_response(r#"[{"id":31,"name":"Yarrow"}]"#, 206).with_header(
            Header::from_bytes("Content-Range", "30-30/31").expect("valid range header"),
        );
        request.respond(response).expect("response should succeed");
    });

    let client = RestClient::new(&addr, "anon-key", Duration::from_secs(1))?;
    let page = fetch_remedy_page(
        &client,
        &PageRequest {
            ticket: 4,
            kind: LoadKind::NextPage,
            search: String::new(),
            page: 1,
            from: 30,
            to: 59,
        },
    )?;
    assert_eq!(page.total, Some(31));
    assert_eq!(page.rows.len(), 1);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn postgrest_errors_are_summarized() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        let body = r#"{"code":"42P01","details":null,"hint":null,"message":"relation \"public.remedies\" does not exist"}"#;
        request
            .respond(json_response(body, 404))
            .expect("response should succeed");
    });

    let client = RestClient::new(&addr, "anon-key", Duration::from_secs(1))?;
    let error = client
        .select(&Query::new("remedies"))
        .expect_err("select should fail");
    assert_eq!(
        error.to_string(),
        "server error (404): relation \"public.remedies\" does not exist [42P01]"
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn acceptance_insert_posts_json_with_session_token() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Post);
        assert_eq!(request.url(), "/rest/v1/user_terms");
        assert_eq!(header(&request, "apikey"), Some("anon-key"));
        assert_eq!(header(&request, "Authorization"), Some("Bearer user-jwt"));
        assert_eq!(header(&request, "Prefer"), Some("return=minimal"));

        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("body should be readable");
        let value: serde_json::Value = serde_json::from_str(&body).expect("json body");
        assert_eq!(
            value,
            json!({"subject_id": "user-1", "scope": "remedies", "version": 2})
        );
        request
            .respond(Response::empty(StatusCode(201)))
            .expect("response should succeed");
    });

    let client = RestClient::new(&addr, "anon-key", Duration::from_secs(1))?
        .with_access_token(Some("user-jwt"));
    record_acceptance(
        &client,
        &AcceptanceRecord {
            subject_id: "user-1".to_owned(),
            scope: "remedies".to_owned(),
            version: 2,
        },
    )?;

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn auth_user_lookup_resolves_authenticated_subject() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/auth/v1/user");
        assert_eq!(header(&request, "Authorization"), Some("Bearer user-jwt"));
        request
            .respond(json_response(r#"{"id":"5b1c","email":"kiri@example.test"}"#, 200))
            .expect("response should succeed");
    });

    let client = RestClient::new(&addr, "anon-key", Duration::from_secs(1))?
        .with_access_token(Some("user-jwt"));
    let kv = MemoryKv::new();
    let subject = resolve_subject(&client, &kv)?;
    assert_eq!(subject, Subject::Authenticated("5b1c".to_owned()));
    assert_eq!(kv.writes(), 0);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn no_session_skips_the_auth_request() -> Result<()> {
    let client = RestClient::new("http://127.0.0.1:1", "anon-key", Duration::from_millis(50))?;
    assert_eq!(client.authenticated_user_id()?, None);
    Ok(())
}
