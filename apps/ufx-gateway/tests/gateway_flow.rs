//! Gateway Flow Integration Tests
//!
//! Drives the client end-to-end over a mock transport: login sweep, order
//! lifecycle, trade de-duplication, heartbeat echo, and session teardown on
//! framing errors.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal_macros::dec;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use ufx_gateway::{
    Credential, Direction, Exchange, GatewayConfig, GatewayError, GatewayEvent, InboundFrame,
    LocalOrderId, OrderKind, OrderRequest, OrderStatus, RequestId, SessionTransport,
    TransportError, UfxClient, codec, protocol,
};

/// Transport double: records every outbound payload and hands out
/// sequential request ids starting at 1.
#[derive(Default)]
struct MockTransport {
    sent: StdMutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl MockTransport {
    fn sent_functions(&self) -> Vec<u32> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|payload| codec::peek_function(payload).unwrap())
            .collect()
    }

    fn last_payload(&self) -> Vec<u8> {
        self.sent.lock().unwrap().last().unwrap().clone()
    }

    /// Request id of the most recent send (ids are sequential from 1).
    fn last_request_id(&self) -> RequestId {
        RequestId::new(self.sent.lock().unwrap().len() as u64)
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, payload: Vec<u8>) -> Result<RequestId, TransportError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(payload);
        Ok(RequestId::new(sent.len() as u64))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        branch_no: 1001,
        entrust_way: "7".to_string(),
        station: "IP^127.0.0.1".to_string(),
        account: "880001".to_string(),
        credential: Credential::new("secret".to_string()),
        primary_server: "10.0.0.1:9359".to_string(),
        backup_server: None,
        poll_cadence: 2,
        poll_interval: std::time::Duration::from_secs(1),
    }
}

struct Harness {
    client: Arc<UfxClient>,
    transport: Arc<MockTransport>,
    events: mpsc::Receiver<GatewayEvent>,
}

fn harness() -> Harness {
    let transport = Arc::new(MockTransport::default());
    let (tx, rx) = mpsc::channel(256);
    let client = Arc::new(UfxClient::new(
        test_config(),
        Arc::clone(&transport) as Arc<dyn SessionTransport>,
        tx,
        CancellationToken::new(),
    ));
    Harness {
        client,
        transport,
        events: rx,
    }
}

fn fields(pairs: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
    pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect()
}

fn login_reply() -> Vec<u8> {
    codec::encode_answer(
        protocol::FUNCTION_USER_LOGIN,
        &[fields(&[
            ("client_id", "C1"),
            ("session_no", "772912"),
            ("user_token", "tok"),
        ])],
    )
}

async fn feed(harness: &Harness, request_id: RequestId, payload: Vec<u8>) {
    harness
        .client
        .handle_frame(InboundFrame {
            request_id,
            payload,
        })
        .await;
}

/// Connect, then answer the login so the session reaches `LoggedIn`.
async fn login(harness: &Harness) {
    harness.client.connect().await.unwrap();
    let login_id = harness.transport.last_request_id();
    feed(harness, login_id, login_reply()).await;
}

fn drain(events: &mut mpsc::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn order_updates(events: &[GatewayEvent]) -> Vec<(LocalOrderId, OrderStatus, u64)> {
    events
        .iter()
        .filter_map(|event| match event {
            GatewayEvent::OrderUpdated(order) => Some((
                order.local_id().clone(),
                order.status(),
                order.traded(),
            )),
            _ => None,
        })
        .collect()
}

fn trade_count(events: &[GatewayEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, GatewayEvent::TradeCreated(_)))
        .count()
}

/// Place an order and acknowledge it with the given venue id. Returns the
/// local order id.
async fn place_acked_order(harness: &mut Harness, venue_id: &str) -> LocalOrderId {
    let local_id = harness
        .client
        .send_order(OrderRequest {
            symbol: "600036".into(),
            exchange: Exchange::Sse,
            direction: Direction::Buy,
            kind: OrderKind::Limit,
            price: dec!(11.50),
            volume: 1000,
        })
        .await
        .unwrap();

    let send_id = harness.transport.last_request_id();
    feed(
        harness,
        send_id,
        codec::encode_answer(
            protocol::FUNCTION_SEND_ORDER,
            &[fields(&[("entrust_no", venue_id)])],
        ),
    )
    .await;
    drain(&mut harness.events);
    local_id
}

fn order_push_row(local_id: &str, venue_id: &str, status: &str, traded: &str) -> Vec<u8> {
    // Push rows carry a millisecond report_time and no init_date.
    codec::encode_answer(
        protocol::FUNCTION_PUSH,
        &[fields(&[
            ("entrust_reference", local_id),
            ("entrust_no", venue_id),
            ("stock_code", "600036"),
            ("exchange_type", "1"),
            ("entrust_bs", "1"),
            ("entrust_prop", "0"),
            ("entrust_price", "11.50"),
            ("entrust_amount", "1000"),
            ("business_amount", traded),
            ("entrust_status", status),
            ("entrust_type", "0"),
            ("report_time", "93015123"),
        ])],
    )
}

fn trade_push_row(local_id: &str, trade_id: &str, volume: &str) -> Vec<u8> {
    // Trade pushes are told apart from order pushes by init_date.
    codec::encode_answer(
        protocol::FUNCTION_PUSH,
        &[fields(&[
            ("entrust_reference", local_id),
            ("business_id", trade_id),
            ("business_price", "11.52"),
            ("business_amount", volume),
            ("entrust_status", "4"),
            ("real_type", "0"),
            ("real_status", "0"),
            ("init_date", "20260828"),
            ("business_time", "93020"),
        ])],
    )
}

// Pushes arrive with request ids the gateway never issued.
const PUSH_ID: RequestId = RequestId::new(9999);

#[tokio::test]
async fn login_sweep_issues_subscriptions_and_queries() {
    let mut h = harness();
    h.client.connect().await.unwrap();

    assert_eq!(h.transport.sent_functions(), vec![protocol::FUNCTION_USER_LOGIN]);

    let login_id = h.transport.last_request_id();
    feed(&h, login_id, login_reply()).await;

    // Both push subscriptions, contracts per exchange, then the order query;
    // the trade query follows from the order-query reply.
    assert_eq!(
        h.transport.sent_functions(),
        vec![
            protocol::FUNCTION_USER_LOGIN,
            protocol::FUNCTION_SUBSCRIBE,
            protocol::FUNCTION_SUBSCRIBE,
            protocol::FUNCTION_QUERY_CONTRACT,
            protocol::FUNCTION_QUERY_CONTRACT,
            protocol::FUNCTION_QUERY_ORDER,
        ]
    );

    let subscribe_rows = codec::decode(&h.transport.sent.lock().unwrap()[1])
        .unwrap()
        .into_rows();
    assert_eq!(subscribe_rows[0]["issue_type"], protocol::ISSUE_TYPE_TRADE);
    assert_eq!(subscribe_rows[0]["user_token"], "tok");

    let order_query_id = h.transport.last_request_id();
    feed(
        &h,
        order_query_id,
        codec::encode_answer(protocol::FUNCTION_QUERY_ORDER, &[]),
    )
    .await;
    assert_eq!(
        h.transport.sent_functions().last(),
        Some(&protocol::FUNCTION_QUERY_TRADE)
    );

    let events = drain(&mut h.events);
    assert!(
        events
            .iter()
            .any(|event| matches!(event, GatewayEvent::LogMessage(msg) if msg.contains("login")))
    );
}

#[tokio::test]
async fn failed_login_does_not_start_the_sweep() {
    let mut h = harness();
    h.client.connect().await.unwrap();

    let login_id = h.transport.last_request_id();
    feed(
        &h,
        login_id,
        codec::encode_answer(
            protocol::FUNCTION_USER_LOGIN,
            &[fields(&[("error_no", "-1"), ("error_info", "bad password")])],
        ),
    )
    .await;

    assert_eq!(h.transport.sent_count(), 1);
    let events = drain(&mut h.events);
    assert!(
        events
            .iter()
            .any(|event| matches!(event, GatewayEvent::LogMessage(msg) if msg.contains("bad password")))
    );

    // Still not logged in: order entry is refused.
    let result = h
        .client
        .send_order(OrderRequest {
            symbol: "600036".into(),
            exchange: Exchange::Sse,
            direction: Direction::Buy,
            kind: OrderKind::Limit,
            price: dec!(11.50),
            volume: 1000,
        })
        .await;
    assert!(matches!(result, Err(GatewayError::NotLoggedIn)));
}

#[tokio::test]
async fn order_lifecycle_send_ack_push_stale_push() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);

    let local_id = h
        .client
        .send_order(OrderRequest {
            symbol: "600036".into(),
            exchange: Exchange::Sse,
            direction: Direction::Buy,
            kind: OrderKind::Limit,
            price: dec!(11.50),
            volume: 1000,
        })
        .await
        .unwrap();
    assert_eq!(local_id, LocalOrderId::new("772912_000001"));

    // Optimistic record is emitted before any venue acknowledgement.
    let events = drain(&mut h.events);
    assert_eq!(
        order_updates(&events),
        vec![(local_id.clone(), OrderStatus::Submitting, 0)]
    );

    let send_request = codec::decode(&h.transport.last_payload()).unwrap().into_rows();
    assert_eq!(send_request[0]["entrust_reference"], "772912_000001");
    assert_eq!(send_request[0]["stock_code"], "600036");
    assert_eq!(send_request[0]["entrust_amount"], "1000");

    let send_id = h.transport.last_request_id();
    feed(
        &h,
        send_id,
        codec::encode_answer(
            protocol::FUNCTION_SEND_ORDER,
            &[fields(&[("entrust_no", "V77")])],
        ),
    )
    .await;

    // Partial fill push advances status and volume.
    feed(&h, PUSH_ID, order_push_row("772912_000001", "V77", "4", "300")).await;
    let events = drain(&mut h.events);
    assert_eq!(
        order_updates(&events),
        vec![(local_id.clone(), OrderStatus::PartTraded, 300)]
    );

    // A delayed push generated before the fill is discarded whole.
    feed(&h, PUSH_ID, order_push_row("772912_000001", "V77", "2", "0")).await;
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn rejected_send_marks_the_order_rejected() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);

    let local_id = h
        .client
        .send_order(OrderRequest {
            symbol: "600036".into(),
            exchange: Exchange::Sse,
            direction: Direction::Sell,
            kind: OrderKind::Limit,
            price: dec!(11.50),
            volume: 500,
        })
        .await
        .unwrap();
    drain(&mut h.events);

    let send_id = h.transport.last_request_id();
    feed(
        &h,
        send_id,
        codec::encode_answer(
            protocol::FUNCTION_SEND_ORDER,
            &[fields(&[("error_no", "-112"), ("error_info", "no funds")])],
        ),
    )
    .await;

    let events = drain(&mut h.events);
    assert_eq!(
        order_updates(&events),
        vec![(local_id, OrderStatus::Rejected, 0)]
    );
}

#[tokio::test]
async fn trade_id_is_deduplicated_across_push_and_query() {
    let mut h = harness();
    login(&h).await;
    let local_id = place_acked_order(&mut h, "V77").await;

    feed(&h, PUSH_ID, trade_push_row(local_id.as_str(), "T9", "300")).await;
    let events = drain(&mut h.events);
    assert_eq!(trade_count(&events), 1);
    // The fill advances the volume; the status riding along settles last.
    assert_eq!(
        order_updates(&events).last(),
        Some(&(local_id.clone(), OrderStatus::PartTraded, 300))
    );

    // The trade query sweep re-delivers the same business_id by venue id.
    feed(
        &h,
        PUSH_ID,
        codec::encode_answer(
            protocol::FUNCTION_QUERY_TRADE,
            &[fields(&[
                ("entrust_no", "V77"),
                ("business_id", "T9"),
                ("business_price", "11.52"),
                ("business_amount", "300"),
                ("date", "20260828"),
                ("business_time", "93020"),
            ])],
        ),
    )
    .await;
    let events = drain(&mut h.events);
    assert_eq!(trade_count(&events), 0);

    // A genuinely new fill still applies.
    feed(&h, PUSH_ID, trade_push_row(local_id.as_str(), "T10", "200")).await;
    let events = drain(&mut h.events);
    assert_eq!(trade_count(&events), 1);
    assert_eq!(order_updates(&events).last().unwrap().2, 500);
}

#[tokio::test]
async fn pushed_fills_after_terminal_state_are_ignored() {
    let mut h = harness();
    login(&h).await;
    let local_id = place_acked_order(&mut h, "V77").await;

    feed(&h, PUSH_ID, trade_push_row(local_id.as_str(), "T1", "300")).await;
    drain(&mut h.events);

    h.client.cancel_order(&local_id).await.unwrap();
    let cancel_id = h.transport.last_request_id();
    feed(
        &h,
        cancel_id,
        codec::encode_answer(protocol::FUNCTION_CANCEL_ORDER, &[]),
    )
    .await;
    let events = drain(&mut h.events);
    assert_eq!(
        order_updates(&events),
        vec![(local_id.clone(), OrderStatus::Cancelled, 300)]
    );

    // Late fills with fresh trade ids must not move the closed order's
    // counter, even once their sum passes its traded volume.
    feed(&h, PUSH_ID, trade_push_row(local_id.as_str(), "T_A", "300")).await;
    feed(&h, PUSH_ID, trade_push_row(local_id.as_str(), "T_B", "100")).await;
    let events = drain(&mut h.events);
    assert_eq!(trade_count(&events), 0);
    assert!(order_updates(&events).is_empty());
}

#[tokio::test]
async fn cancel_success_forces_cancelled() {
    let mut h = harness();
    login(&h).await;
    let local_id = place_acked_order(&mut h, "V77").await;

    h.client.cancel_order(&local_id).await.unwrap();
    assert_eq!(
        h.transport.sent_functions().last(),
        Some(&protocol::FUNCTION_CANCEL_ORDER)
    );
    let cancel_request = codec::decode(&h.transport.last_payload()).unwrap().into_rows();
    assert_eq!(cancel_request[0]["entrust_no"], "V77");

    let cancel_id = h.transport.last_request_id();
    feed(
        &h,
        cancel_id,
        codec::encode_answer(protocol::FUNCTION_CANCEL_ORDER, &[]),
    )
    .await;

    let events = drain(&mut h.events);
    assert_eq!(
        order_updates(&events),
        vec![(local_id, OrderStatus::Cancelled, 0)]
    );
}

#[tokio::test]
async fn cancel_failure_leaves_order_and_requeries() {
    let mut h = harness();
    login(&h).await;
    let local_id = place_acked_order(&mut h, "V77").await;

    h.client.cancel_order(&local_id).await.unwrap();
    let cancel_id = h.transport.last_request_id();
    feed(
        &h,
        cancel_id,
        codec::encode_answer(
            protocol::FUNCTION_CANCEL_ORDER,
            &[fields(&[("error_no", "-5"), ("error_info", "too late")])],
        ),
    )
    .await;

    // No forced state change; a directed order query goes out instead.
    let events = drain(&mut h.events);
    assert!(order_updates(&events).is_empty());
    assert_eq!(
        h.transport.sent_functions().last(),
        Some(&protocol::FUNCTION_QUERY_ORDER)
    );
    let query = codec::decode(&h.transport.last_payload()).unwrap().into_rows();
    assert_eq!(query[0]["locate_entrust_no"], "V77");
}

#[tokio::test]
async fn cancel_before_ack_is_dropped() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);

    let local_id = h
        .client
        .send_order(OrderRequest {
            symbol: "600036".into(),
            exchange: Exchange::Sse,
            direction: Direction::Buy,
            kind: OrderKind::Limit,
            price: dec!(11.50),
            volume: 1000,
        })
        .await
        .unwrap();

    let before = h.transport.sent_count();
    h.client.cancel_order(&local_id).await.unwrap();
    // Venue id not yet learned: nothing goes out.
    assert_eq!(h.transport.sent_count(), before);
}

#[tokio::test]
async fn heartbeat_is_echoed_inline() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);
    let before = h.transport.sent_count();

    feed(
        &h,
        PUSH_ID,
        codec::encode_request(protocol::FUNCTION_HEARTBEAT, &[]),
    )
    .await;

    assert_eq!(h.transport.sent_count(), before + 1);
    let echo = codec::decode(&h.transport.last_payload()).unwrap();
    assert_eq!(echo.kind, codec::FrameKind::Answer);
    assert_eq!(echo.function, protocol::FUNCTION_HEARTBEAT);
    // The engine never sees the heartbeat.
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn framing_error_tears_the_session_down() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);

    feed(&h, PUSH_ID, vec![0xde, 0xad, 0xbe, 0xef]).await;

    assert!(h.transport.is_closed());
    let events = drain(&mut h.events);
    assert!(
        events
            .iter()
            .any(|event| matches!(event, GatewayEvent::LogMessage(msg) if msg.contains("protocol error")))
    );

    // The session is gone: order entry is refused again.
    let result = h
        .client
        .send_order(OrderRequest {
            symbol: "600036".into(),
            exchange: Exchange::Sse,
            direction: Direction::Buy,
            kind: OrderKind::Limit,
            price: dec!(11.50),
            volume: 1000,
        })
        .await;
    assert!(matches!(result, Err(GatewayError::NotLoggedIn)));
}

#[tokio::test]
async fn account_and_position_replies_become_events() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);

    feed(
        &h,
        PUSH_ID,
        codec::encode_answer(
            protocol::FUNCTION_QUERY_ACCOUNT,
            &[fields(&[
                ("current_balance", "100000.50"),
                ("frozen_balance", "250"),
            ])],
        ),
    )
    .await;
    feed(
        &h,
        PUSH_ID,
        codec::encode_answer(
            protocol::FUNCTION_QUERY_POSITION,
            &[fields(&[
                ("stock_code", "600036"),
                ("exchange_type", "1"),
                ("current_amount", "1000"),
                ("av_cost_price", "11.20"),
                ("frozen_amount", "0"),
                ("enable_amount", "1000"),
                ("income_balance", "-35.5"),
            ])],
        ),
    )
    .await;

    let events = drain(&mut h.events);
    assert!(
        events
            .iter()
            .any(|event| matches!(event, GatewayEvent::AccountUpdated(a) if a.balance == dec!(100000.50)))
    );
    assert!(
        events
            .iter()
            .any(|event| matches!(event, GatewayEvent::PositionUpdated(p) if p.volume == 1000))
    );
}

#[tokio::test]
async fn contract_rows_are_cached_and_emitted() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);

    feed(
        &h,
        PUSH_ID,
        codec::encode_answer(
            protocol::FUNCTION_QUERY_CONTRACT,
            &[
                fields(&[
                    ("stock_code", "600036"),
                    ("exchange_type", "1"),
                    ("stock_name", "CMB"),
                    ("store_unit", "100"),
                    ("price_step", "0.01"),
                    ("buy_unit", "100"),
                ]),
                fields(&[
                    ("stock_code", "600519"),
                    ("exchange_type", "1"),
                    ("stock_name", "Moutai"),
                    ("store_unit", "100"),
                    ("price_step", "0.01"),
                    ("buy_unit", "100"),
                ]),
            ],
        ),
    )
    .await;

    let events = drain(&mut h.events);
    let contracts: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            GatewayEvent::ContractUpdated(contract) => Some(contract.symbol.as_str().to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(contracts, vec!["600036", "600519"]);
}

#[tokio::test]
async fn poll_ticks_alternate_account_and_position() {
    let mut h = harness();
    login(&h).await;
    drain(&mut h.events);
    let before = h.transport.sent_count();

    // Cadence 2: ticks 1 and 3 are silent, ticks 2 and 4 fire.
    h.client.on_timer_tick().await;
    assert_eq!(h.transport.sent_count(), before);
    h.client.on_timer_tick().await;
    h.client.on_timer_tick().await;
    h.client.on_timer_tick().await;

    let functions = h.transport.sent_functions();
    assert_eq!(
        &functions[before..],
        &[
            protocol::FUNCTION_QUERY_ACCOUNT,
            protocol::FUNCTION_QUERY_POSITION,
        ]
    );
}

/// Transport whose `connect` blocks until released, so a second caller can
/// be driven in while the first still holds the `Connecting` state.
#[derive(Default)]
struct GatedConnectTransport {
    entered: Notify,
    release: Notify,
    sent: StdMutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl SessionTransport for GatedConnectTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn send(&self, payload: Vec<u8>) -> Result<RequestId, TransportError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(payload);
        Ok(RequestId::new(sent.len() as u64))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn connect_is_refused_while_another_attempt_holds_the_link() {
    let transport = Arc::new(GatedConnectTransport::default());
    let (tx, _events) = mpsc::channel(256);
    let client = Arc::new(UfxClient::new(
        test_config(),
        Arc::clone(&transport) as Arc<dyn SessionTransport>,
        tx,
        CancellationToken::new(),
    ));

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.connect().await }
    });
    transport.entered.notified().await;

    // The link is still coming up: the overlapping call must not fall
    // through to login over it.
    let second = client.connect().await;
    assert!(matches!(second, Err(GatewayError::ConnectInProgress)));

    transport.release.notify_one();
    first.await.unwrap().unwrap();
    // The first attempt completed normally and issued its login packet.
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_echo_rows_in_order_push_are_skipped() {
    let mut h = harness();
    login(&h).await;
    let local_id = place_acked_order(&mut h, "V77").await;

    // entrust_type 2 is the venue's cancel-request echo, not a state change.
    feed(
        &h,
        PUSH_ID,
        codec::encode_answer(
            protocol::FUNCTION_PUSH,
            &[fields(&[
                ("entrust_reference", local_id.as_str()),
                ("entrust_no", "V77"),
                ("stock_code", "600036"),
                ("exchange_type", "1"),
                ("entrust_bs", "1"),
                ("entrust_prop", "0"),
                ("entrust_price", "11.50"),
                ("entrust_amount", "1000"),
                ("business_amount", "0"),
                ("entrust_status", "2"),
                ("entrust_type", "2"),
                ("report_time", "93015123"),
            ])],
        ),
    )
    .await;

    assert!(drain(&mut h.events).is_empty());
}
