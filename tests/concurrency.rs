//! Many request handling threads sharing one node.
//!
//! Run with: cargo test --test concurrency

use std::{net::SocketAddr, sync::Arc, time::Duration};

use rayon::prelude::*;

use mojito_core::{
    common::{Contact, KeyId, KeyKind, Value, ValueType, Vendor, Version},
    config::DatabaseSettings,
    db::ValueRecord,
    messages::{DefaultMessageFactory, MessageFactory, MessageType, ResponseSpecific, StoreStatus},
    routing::StaticRouteTable,
    security::{FramingSafeByteFilter, MessageId, SecurityTokenProvider},
    server::{DefaultServer, Server},
    Config, Context,
};

fn contact(ip: [u8; 4], port: u16) -> Contact {
    Contact::new(
        KeyId::random(KeyKind::Node),
        SocketAddr::from((ip, port)),
        Vendor::UNKNOWN,
        Version::ZERO,
    )
    .expect("node id")
}

fn server(config: Config) -> DefaultServer {
    let local = contact([10, 0, 0, 1], 6881);
    let context = Context::new(config, Arc::new(StaticRouteTable::new(local)))
        .expect("context")
        .with_tokens(SecurityTokenProvider::new().with_filter(FramingSafeByteFilter::none()));

    DefaultServer::new(Arc::new(context))
}

#[test]
fn concurrent_stores() {
    let server = server(Config::default());
    let key = KeyId::from_content(b"shared");

    let statuses: Vec<StoreStatus> = (0..200_u32)
        .into_par_iter()
        .map(|i| {
            let creator = contact([10, 1, (i / 250) as u8, (i % 250) as u8 + 1], 6881);
            let token = server
                .context()
                .tokens()
                .token_for(creator.address())
                .expect("token");

            let value = Value::new(ValueType::TEXT, Version::ZERO, "v");
            let record =
                ValueRecord::remote(creator.clone(), creator.clone(), key, value).expect("record");

            let request = DefaultMessageFactory.create_store_request(
                creator.clone(),
                MessageId::random(),
                token,
                vec![record],
            );

            let response = server
                .handle_request(creator.address(), &request)
                .expect("store response");

            match &response.message_type {
                MessageType::Response(ResponseSpecific::Store(arguments)) => {
                    arguments.statuses[0].status
                }
                other => panic!("expected a store response, got {:?}", other),
            }
        })
        .collect();

    assert!(statuses.iter().all(|status| *status == StoreStatus::Succeeded));

    let database = server.context().database().lock();
    assert_eq!(database.key_count(), 1);
    assert_eq!(database.value_count(), 200);
    assert_eq!(database.statistics().stored(), 200);
}

#[test]
fn stores_race_with_sweeps() {
    let server = server(Config {
        sweep_interval: Duration::from_millis(1),
        database: DatabaseSettings {
            max_values_per_address: None,
            value_expiration: Duration::ZERO,
            far_value_expiration: Duration::ZERO,
            ..Default::default()
        },
        ..Default::default()
    });

    let sweeper = server.context().sweeper();
    sweeper.start().expect("start");

    // Every remote record is already expired, local ones never are.
    (0..500_u32).into_par_iter().for_each(|i| {
        let creator = contact([10, 2, 0, 1], 7000);
        let key = KeyId::random(KeyKind::Value);
        let value = Value::new(ValueType::TEXT, Version::ZERO, "v");

        let mut database = server.context().database().lock();
        if i % 2 == 0 {
            let record = ValueRecord::remote(creator.clone(), creator, key, value).expect("record");
            database.store(record).expect("stored");
        } else {
            let record = ValueRecord::local(&creator, key, value).expect("record");
            database.store(record).expect("stored");
        }
    });

    sweeper.close();
    sweeper.sweep();

    let database = server.context().database().lock();
    assert_eq!(database.value_count(), 250);
    assert!(database.values().all(|record| record.is_local()));
    assert_eq!(
        database.statistics().expired(),
        database.statistics().stored() - 250
    );
}

#[test]
fn tokens_are_thread_safe() {
    let server = server(Config::default());
    let tokens = server.context().tokens();

    let mismatches = (0..1000_u16)
        .into_par_iter()
        .filter(|port| {
            let address = SocketAddr::from(([192, 168, 1, 1], 1000 + port));
            let token = tokens.token_for(address).expect("token");

            !tokens.is_for(token.as_bytes(), address)
        })
        .count();

    assert_eq!(mismatches, 0);
}
