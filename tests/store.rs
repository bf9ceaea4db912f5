//! End to end store scenario between two nodes.
//!
//! Run with: cargo test --test store

use std::{net::SocketAddr, sync::Arc};

use mojito_core::{
    common::{Contact, KeyId, KeyKind, Value, ValueType, Vendor, Version},
    messages::{Message, MessageType, ResponseSpecific, StoreStatus},
    routing::StaticRouteTable,
    security::{FramingSafeByteFilter, SecurityToken, SecurityTokenProvider},
    server::{DefaultServer, Server},
    Config, Context,
};
use tracing::Level;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
}

fn node(ip: [u8; 4], port: u16) -> DefaultServer {
    // Without reserved bytes every address has a token.
    let tokens = SecurityTokenProvider::new().with_filter(FramingSafeByteFilter::none());

    DefaultServer::new(Arc::new(context(ip, port).with_tokens(tokens)))
}

/// A node with the default, legacy framing safe, tokens.
fn legacy_node(ip: [u8; 4], port: u16) -> DefaultServer {
    DefaultServer::new(Arc::new(context(ip, port)))
}

fn context(ip: [u8; 4], port: u16) -> Context {
    let local = Contact::new(
        KeyId::random(KeyKind::Node),
        SocketAddr::from((ip, port)),
        Vendor::UNKNOWN,
        Version::ZERO,
    )
    .expect("node id");

    let config = Config {
        vendor: Vendor::from_fourcc(*b"LIME"),
        version: Version::new(1, 0),
        ..Default::default()
    };

    Context::new(config, Arc::new(StaticRouteTable::new(local))).expect("context")
}

fn address(node: &DefaultServer) -> SocketAddr {
    node.context().local_contact().address()
}

/// Find node round trip, returns the token `to` issued for `from`.
fn obtain_token(from: &DefaultServer, to: &DefaultServer) -> SecurityToken {
    let request = from
        .context()
        .message_helper()
        .find_node_request(address(to), KeyId::random(KeyKind::Node));

    let response = to
        .handle_request(address(from), &request)
        .expect("find node response");

    assert!(from.accept_response(&response));

    response.security_token().cloned().expect("token")
}

fn store(
    from: &DefaultServer,
    to: &DefaultServer,
    token: &SecurityToken,
    key: KeyId,
    value: Value,
) -> Vec<StoreStatus> {
    let record = from
        .context()
        .create_local_record(key, value)
        .expect("record");

    let request = from
        .context()
        .message_helper()
        .store_request(address(to), token.clone(), vec![record]);

    let response = to
        .handle_request(address(from), &request)
        .expect("store response");

    assert!(from.accept_response(&response));

    statuses(&response)
}

fn statuses(response: &Message) -> Vec<StoreStatus> {
    match &response.message_type {
        MessageType::Response(ResponseSpecific::Store(arguments)) => {
            arguments.statuses.iter().map(|entry| entry.status).collect()
        }
        other => panic!("expected a store response, got {:?}", other),
    }
}

#[test]
fn store_replace_remove() {
    init_logging();

    let a = node([10, 0, 0, 1], 6881);
    let b = node([10, 0, 0, 2], 6882);
    let key = KeyId::from_content(b"hello");

    let token = obtain_token(&a, &b);

    let statuses = store(
        &a,
        &b,
        &token,
        key,
        Value::new(ValueType::TEXT, Version::new(1, 0), "hello"),
    );
    assert_eq!(statuses, vec![StoreStatus::Succeeded]);

    {
        let database = b.context().database().lock();
        let bag = database.get(&key).expect("bag");
        assert_eq!(bag.len(), 1);

        let record = bag
            .get(a.context().local_contact().node_id())
            .expect("record");
        assert_eq!(record.creator(), a.context().local_contact());
        assert_eq!(record.sender(), a.context().local_contact());
        assert!(record.is_direct());
        assert!(!record.is_local());
    }

    // Version 2 replaces in place.
    let statuses = store(
        &a,
        &b,
        &token,
        key,
        Value::new(ValueType::TEXT, Version::new(2, 0), "hello again"),
    );
    assert_eq!(statuses, vec![StoreStatus::Succeeded]);

    {
        let database = b.context().database().lock();
        let bag = database.get(&key).expect("bag");
        assert_eq!(bag.len(), 1);

        let record = bag
            .get(a.context().local_contact().node_id())
            .expect("record");
        assert_eq!(record.value().version(), Version::new(2, 0));
        assert_eq!(&record.value().data()[..], b"hello again");
    }

    // An empty value removes.
    let statuses = store(
        &a,
        &b,
        &token,
        key,
        Value::empty(ValueType::TEXT, Version::new(3, 0)),
    );
    assert_eq!(statuses, vec![StoreStatus::Succeeded]);

    let database = b.context().database().lock();
    assert!(database.get(&key).is_none());
    assert_eq!(database.key_count(), 0);
}

#[test]
fn token_is_bound_to_its_address() {
    init_logging();

    let a = node([10, 0, 0, 1], 6881);
    let b = node([10, 0, 0, 2], 6882);
    let c = node([10, 0, 0, 3], 6883);

    // C replays the token B issued for A.
    let token = obtain_token(&a, &b);

    let record = c
        .context()
        .create_local_record(
            KeyId::random(KeyKind::Value),
            Value::new(ValueType::TEXT, Version::new(1, 0), "spam"),
        )
        .expect("record");
    let request = c
        .context()
        .message_helper()
        .store_request(address(&b), token, vec![record]);

    assert!(b.handle_request(address(&c), &request).is_none());
    assert_eq!(b.context().database().lock().value_count(), 0);
}

#[test]
fn spoofed_response_is_dropped() {
    init_logging();

    let a = node([10, 0, 0, 1], 6881);
    let b = node([10, 0, 0, 2], 6882);
    let mallory = node([10, 6, 6, 6], 6666);

    let request = a
        .context()
        .message_helper()
        .find_node_request(address(&b), KeyId::random(KeyKind::Node));

    // Mallory saw the request id but is not who it was sent to.
    let spoofed = mallory
        .handle_request(address(&a), &request)
        .expect("response");

    assert_eq!(spoofed.message_id, request.message_id);
    assert!(!a.accept_response(&spoofed));

    let genuine = b.handle_request(address(&a), &request).expect("response");
    assert!(a.accept_response(&genuine));
}

#[test]
fn find_value_after_store() {
    init_logging();

    let a = node([10, 0, 0, 1], 6881);
    let b = node([10, 0, 0, 2], 6882);
    let key = KeyId::from_content(b"hello");

    let token = obtain_token(&a, &b);
    store(
        &a,
        &b,
        &token,
        key,
        Value::new(ValueType::TEXT, Version::new(1, 0), "hello"),
    );

    let request = a.context().message_helper().find_value_request(
        address(&b),
        key,
        Vec::new(),
        ValueType::TEXT,
    );
    let response = b.handle_request(address(&a), &request).expect("response");
    assert!(a.accept_response(&response));

    match &response.message_type {
        MessageType::Response(ResponseSpecific::FindValue(arguments)) => {
            assert_eq!(arguments.records.len(), 1);
            assert!(arguments.secondary_keys.is_empty());
            assert_eq!(
                &arguments.records[0].value().data()[..],
                b"hello"
            );
        }
        other => panic!("expected a find value response, got {:?}", other),
    }

    // Filtering on another value type returns nothing.
    let request = a.context().message_helper().find_value_request(
        address(&b),
        key,
        Vec::new(),
        ValueType::BINARY,
    );
    let response = b.handle_request(address(&a), &request).expect("response");

    match &response.message_type {
        MessageType::Response(ResponseSpecific::FindValue(arguments)) => {
            assert!(arguments.records.is_empty());
        }
        other => panic!("expected a find value response, got {:?}", other),
    }
}

#[test]
fn store_with_legacy_tokens() {
    init_logging();

    let b = legacy_node([10, 0, 0, 2], 6882);

    // Pick a requester both sides can issue tokens for.
    let a = (0..100_u16)
        .map(|i| legacy_node([10, 0, 0, 1], 7000 + i))
        .find(|a| {
            b.context().tokens().token_for(address(a)).is_ok()
                && a.context().tokens().token_for(address(&b)).is_ok()
        })
        .expect("a requester with tokens");

    let token = obtain_token(&a, &b);
    assert!(FramingSafeByteFilter::legacy().is_safe(&token.as_bytes()[..8]));
    assert_eq!(
        a.context().local_contact().vendor(),
        Vendor::from_fourcc(*b"LIME")
    );

    let key = KeyId::from_content(b"legacy");
    let statuses = store(
        &a,
        &b,
        &token,
        key,
        Value::new(ValueType::TEXT, Version::new(1, 0), "hello"),
    );
    assert_eq!(statuses, vec![StoreStatus::Succeeded]);
    assert_eq!(b.context().database().lock().value_count(), 1);
}

#[test]
fn find_node_without_obtainable_token() {
    init_logging();

    let b = legacy_node([10, 0, 0, 2], 6882);

    // Some ports encrypt to a reserved byte in every window.
    let unlucky = (1..=u16::MAX)
        .map(|port| SocketAddr::from(([10, 0, 0, 9], port)))
        .find(|address| b.context().tokens().token_for(*address).is_err())
        .expect("an address without a token");

    let a = legacy_node([10, 0, 0, 9], unlucky.port());
    let request = a
        .context()
        .message_helper()
        .find_node_request(address(&b), KeyId::random(KeyKind::Node));

    let response = b
        .handle_request(unlucky, &request)
        .expect("find node response");

    assert_eq!(response.message_id, request.message_id);
    match &response.message_type {
        MessageType::Response(ResponseSpecific::FindNode(arguments)) => {
            assert!(arguments.security_token.is_none());
        }
        other => panic!("expected a find node response, got {:?}", other),
    }
}
