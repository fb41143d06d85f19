//! UFX session client.
//!
//! Owns the transport capability, the session state machine, the
//! reconciliation book and the correlation table, and runs the inbound
//! dispatch loop. Two execution contexts touch the shared state: the
//! caller's (connect/send/cancel/query plus the poll timer) and the
//! inbound frame loop. One mutex serializes them; no handler performs
//! network I/O while holding it. Requests are computed under the lock and
//! sent after release, and inbound handlers lock only for the table
//! mutation.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{InboundFrame, SessionTransport, TransportError};
use crate::application::services::{PollOperation, PollScheduler};
use crate::domain::events::GatewayEvent;
use crate::domain::model::{
    Exchange, LocalOrderId, Order, OrderRequest, RequestId, VenueOrderId,
};
use crate::domain::reconciliation::{FillOutcome, ReconciliationBook, UpdateSource};
use crate::infrastructure::config::GatewayConfig;

use super::codec::{self, CodecError, Row};
use super::correlation::{CorrelationKey, CorrelationTable};
use super::messages::{self, LoginReply};
use super::protocol;
use super::session::{ConnectAction, Session};

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced to the caller's context.
///
/// Inbound protocol anomalies never appear here: they are logged and the
/// offending message is dropped.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The transport reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The operation requires an authenticated session.
    #[error("session is not logged in")]
    NotLoggedIn,

    /// The order is not known to the book.
    #[error("unknown order: {0}")]
    UnknownOrder(LocalOrderId),

    /// Another `connect()` call is still opening the link.
    #[error("connection attempt already in progress")]
    ConnectInProgress,
}

// =============================================================================
// Reply Dispatch
// =============================================================================

/// Reply classes, keyed by function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Login,
    QueryContract,
    QueryAccount,
    QueryPosition,
    QueryOrder,
    QueryTrade,
    SendOrder,
    CancelOrder,
    Subscription,
    Push,
}

const fn classify(function: u32) -> Option<ReplyKind> {
    match function {
        protocol::FUNCTION_USER_LOGIN => Some(ReplyKind::Login),
        protocol::FUNCTION_QUERY_CONTRACT => Some(ReplyKind::QueryContract),
        protocol::FUNCTION_QUERY_ACCOUNT => Some(ReplyKind::QueryAccount),
        protocol::FUNCTION_QUERY_POSITION => Some(ReplyKind::QueryPosition),
        protocol::FUNCTION_QUERY_ORDER => Some(ReplyKind::QueryOrder),
        protocol::FUNCTION_QUERY_TRADE => Some(ReplyKind::QueryTrade),
        protocol::FUNCTION_SEND_ORDER => Some(ReplyKind::SendOrder),
        protocol::FUNCTION_CANCEL_ORDER => Some(ReplyKind::CancelOrder),
        protocol::FUNCTION_SUBSCRIBE => Some(ReplyKind::Subscription),
        protocol::FUNCTION_PUSH => Some(ReplyKind::Push),
        _ => None,
    }
}

// =============================================================================
// Client
// =============================================================================

/// Shared state behind the client's single lock.
struct Inner {
    session: Session,
    book: ReconciliationBook,
    correlation: CorrelationTable,
    scheduler: PollScheduler,
    order_count: u64,
}

/// The UFX session client.
///
/// Constructed with the transport capability injected; the host wires the
/// transport's inbound callback to the frame channel consumed by [`run`].
///
/// [`run`]: UfxClient::run
pub struct UfxClient {
    config: GatewayConfig,
    transport: Arc<dyn SessionTransport>,
    events: mpsc::Sender<GatewayEvent>,
    cancel: CancellationToken,
    inner: Mutex<Inner>,
}

impl UfxClient {
    /// Create a client over an injected transport.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn SessionTransport>,
        events: mpsc::Sender<GatewayEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let scheduler = PollScheduler::new(config.poll_cadence);
        Self {
            config,
            transport,
            events,
            cancel,
            inner: Mutex::new(Inner {
                session: Session::new(),
                book: ReconciliationBook::new(),
                correlation: CorrelationTable::new(),
                scheduler,
                order_count: 0,
            }),
        }
    }

    // =========================================================================
    // Inbound Loop
    // =========================================================================

    /// Consume inbound frames until cancelled or the channel closes.
    pub async fn run(self: Arc<Self>, mut frames: mpsc::Receiver<InboundFrame>) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Gateway client cancelled");
                    return;
                }
                frame = frames.recv() => {
                    match frame {
                        Some(frame) => self.handle_frame(frame).await,
                        None => {
                            tracing::info!("Inbound frame channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Process one inbound frame.
    ///
    /// The function code is read from the header before any other action.
    /// The heartbeat is echoed inline, bypassing decode, correlation and
    /// the reconciliation book; a framing error is fatal to the session.
    pub async fn handle_frame(&self, frame: InboundFrame) {
        let function = match codec::peek_function(&frame.payload) {
            Ok(function) => function,
            Err(error) => {
                self.fatal_protocol_error(&error).await;
                return;
            }
        };

        if function == protocol::FUNCTION_HEARTBEAT {
            self.echo_heartbeat(&frame.payload).await;
            return;
        }

        let decoded = match codec::decode(&frame.payload) {
            Ok(decoded) => decoded,
            Err(error) => {
                self.fatal_protocol_error(&error).await;
                return;
            }
        };
        let rows = decoded.into_rows();

        let Some(kind) = classify(function) else {
            tracing::warn!(function, "No handler for inbound function code");
            return;
        };

        match kind {
            ReplyKind::Login => self.on_login(&rows).await,
            ReplyKind::QueryContract => self.on_query_contract(&rows).await,
            ReplyKind::QueryAccount => self.on_query_account(&rows).await,
            ReplyKind::QueryPosition => self.on_query_position(&rows).await,
            ReplyKind::QueryOrder => self.on_query_order(&rows).await,
            ReplyKind::QueryTrade => self.on_query_trade(&rows).await,
            ReplyKind::SendOrder => self.on_send_order(frame.request_id, &rows).await,
            ReplyKind::CancelOrder => self.on_cancel_order(frame.request_id, &rows).await,
            ReplyKind::Subscription => Self::on_subscription(&rows),
            ReplyKind::Push => self.on_push(&rows).await,
        }
    }

    /// Answer the heartbeat on the same connection, immediately.
    ///
    /// Failing to echo promptly makes the transport consider the session
    /// dead, so nothing is allowed to queue ahead of this.
    async fn echo_heartbeat(&self, payload: &[u8]) {
        match codec::heartbeat_answer(payload) {
            Ok(answer) => {
                if let Err(error) = self.transport.send(answer).await {
                    tracing::warn!(error = %error, "Heartbeat echo failed");
                }
            }
            Err(error) => self.fatal_protocol_error(&error).await,
        }
    }

    /// A framing inconsistency: protocol state is no longer trustworthy,
    /// so the session is torn down rather than resynchronized.
    async fn fatal_protocol_error(&self, error: &CodecError) {
        tracing::error!(error = %error, "Fatal protocol error; closing session");
        self.inner.lock().session.disconnect();
        if let Err(close_error) = self.transport.close().await {
            tracing::warn!(error = %close_error, "Transport close failed");
        }
        self.emit(GatewayEvent::LogMessage(format!(
            "Session closed on protocol error: {error}"
        )))
        .await;
    }

    async fn emit(&self, event: GatewayEvent) {
        let _ = self.events.send(event).await;
    }

    async fn emit_order(&self, order: Order) {
        self.emit(GatewayEvent::OrderUpdated(Box::new(order))).await;
    }

    // =========================================================================
    // Outbound Operations
    // =========================================================================

    /// Connect to the venue and log in.
    ///
    /// Idempotent: an existing connection is reused and only the login
    /// step is re-issued. A call that overlaps an attempt still opening
    /// the link fails with [`GatewayError::ConnectInProgress`] instead of
    /// logging in over a link that is not up yet.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let action = self.inner.lock().session.begin_connect();

        match action {
            ConnectAction::InFlight => return Err(GatewayError::ConnectInProgress),
            ConnectAction::Reuse => {}
            ConnectAction::Start => {
                if let Err(error) = self.transport.connect().await {
                    tracing::error!(error = %error, servers = %self.config.servers(), "Venue connection failed");
                    self.inner.lock().session.connect_failed();
                    return Err(error.into());
                }
                self.inner.lock().session.connected();
                tracing::info!(servers = %self.config.servers(), "Venue connection established");
            }
        }

        if !self.inner.lock().session.is_logged_in() {
            self.login().await?;
        }
        Ok(())
    }

    /// Mark the session inactive and close the transport.
    pub async fn close(&self) -> Result<(), GatewayError> {
        self.inner.lock().session.disconnect();
        self.transport.close().await?;
        Ok(())
    }

    /// Send the authentication packet.
    async fn login(&self) -> Result<(), GatewayError> {
        let mut fields = self.base_request();
        fields.push(("password", self.config.credential.password().to_string()));
        fields.push(("password_type", "2".to_string()));
        fields.push(("input_content", "1".to_string()));
        fields.push(("account_content", self.config.account.clone()));
        fields.push(("content_type", "0".to_string()));
        fields.push(("branch_no", self.config.branch_no.to_string()));

        self.send_request(protocol::FUNCTION_USER_LOGIN, &fields)
            .await?;
        Ok(())
    }

    /// Subscribe to one push channel (trade or order events).
    async fn subscribe(&self, issue_type: &str) -> Result<(), GatewayError> {
        let identity = {
            let inner = self.inner.lock();
            inner.session.identity().clone()
        };

        let mut fields = vec![
            ("branch_no", self.config.branch_no.to_string()),
            ("fund_account", self.config.account.clone()),
        ];
        fields.extend(self.base_request());
        fields.push(("client_id", identity.client_id));
        fields.push(("password", self.config.credential.password().to_string()));
        fields.push(("user_token", identity.user_token));
        fields.push(("issue_type", issue_type.to_string()));

        self.send_request(protocol::FUNCTION_SUBSCRIBE, &fields)
            .await?;
        Ok(())
    }

    /// Query contract metadata for one exchange.
    ///
    /// Pre-login exempt: carries the account and password but not the
    /// session triple.
    pub async fn query_contracts(&self, exchange: Exchange) -> Result<(), GatewayError> {
        let mut fields = self.base_request();
        fields.push(("fund_account", self.config.account.clone()));
        fields.push(("password", self.config.credential.password().to_string()));
        fields.push(("query_type", "1".to_string()));
        fields.push(("exchange_type", messages::exchange_code(exchange).to_string()));
        fields.push(("stock_type", "0".to_string()));

        self.send_request(protocol::FUNCTION_QUERY_CONTRACT, &fields)
            .await?;
        Ok(())
    }

    /// Query today's orders. No-op until logged in.
    pub async fn query_orders(&self) -> Result<(), GatewayError> {
        self.query_with_session(protocol::FUNCTION_QUERY_ORDER, None)
            .await
    }

    /// Query today's trades. No-op until logged in.
    pub async fn query_trades(&self) -> Result<(), GatewayError> {
        self.query_with_session(protocol::FUNCTION_QUERY_TRADE, None)
            .await
    }

    /// Query account balances. No-op until logged in.
    pub async fn query_account(&self) -> Result<(), GatewayError> {
        self.query_with_session(protocol::FUNCTION_QUERY_ACCOUNT, None)
            .await
    }

    /// Query position holdings. No-op until logged in.
    pub async fn query_position(&self) -> Result<(), GatewayError> {
        self.query_with_session(protocol::FUNCTION_QUERY_POSITION, None)
            .await
    }

    async fn query_with_session(
        &self,
        function: u32,
        locate: Option<&VenueOrderId>,
    ) -> Result<(), GatewayError> {
        let Some(mut fields) = self.authenticated_request() else {
            tracing::debug!(function, "Query skipped: not logged in");
            return Ok(());
        };
        fields.push(("request_num", "10".to_string()));
        if let Some(venue_id) = locate {
            fields.push(("locate_entrust_no", venue_id.as_str().to_string()));
        }

        self.send_request(function, &fields).await?;
        Ok(())
    }

    /// Place an order.
    ///
    /// The optimistic local record is created the instant the send is
    /// issued, before any venue acknowledgement, and the correlation entry
    /// routes the eventual send reply back to it.
    pub async fn send_order(&self, request: OrderRequest) -> Result<LocalOrderId, GatewayError> {
        let (local_id, order, fields) = {
            let mut inner = self.inner.lock();
            if !inner.session.is_logged_in() {
                return Err(GatewayError::NotLoggedIn);
            }

            inner.order_count += 1;
            let local_id =
                LocalOrderId::from_sequence(&inner.session.identity().session_no, inner.order_count);

            let order = Order::submitted(
                local_id.clone(),
                request.symbol.clone(),
                request.exchange,
                request.direction,
                request.kind,
                request.price,
                request.volume,
                Utc::now(),
            );
            let order = inner.book.insert_submitted(order);

            let identity = inner.session.identity().clone();
            let mut fields = self.base_request();
            fields.push(("branch_no", self.config.branch_no.to_string()));
            fields.push(("client_id", identity.client_id));
            fields.push(("fund_account", self.config.account.clone()));
            fields.push(("password", self.config.credential.password().to_string()));
            fields.push(("password_type", "2".to_string()));
            fields.push((
                "exchange_type",
                messages::exchange_code(request.exchange).to_string(),
            ));
            fields.push(("stock_code", request.symbol.as_str().to_string()));
            fields.push(("entrust_amount", request.volume.to_string()));
            fields.push(("entrust_price", request.price.to_string()));
            fields.push((
                "entrust_bs",
                messages::direction_code(request.direction).to_string(),
            ));
            fields.push(("entrust_prop", messages::kind_code(request.kind).to_string()));
            fields.push(("entrust_reference", local_id.as_str().to_string()));
            fields.push(("user_token", identity.user_token));

            (local_id, order, fields)
        };

        self.emit_order(order).await;

        let request_id = self
            .send_request(protocol::FUNCTION_SEND_ORDER, &fields)
            .await?;

        self.inner
            .lock()
            .correlation
            .record(request_id, CorrelationKey::Order(local_id.clone()));

        tracing::info!(order_id = %local_id, request_id = %request_id, "Order sent");
        Ok(local_id)
    }

    /// Cancel an order by local id.
    ///
    /// Requires the venue id to be known; a cancel before the send
    /// acknowledgement is logged and dropped.
    pub async fn cancel_order(&self, local_id: &LocalOrderId) -> Result<(), GatewayError> {
        let (venue_id, fields) = {
            let inner = self.inner.lock();
            if !inner.session.is_logged_in() {
                return Err(GatewayError::NotLoggedIn);
            }
            if inner.book.order(local_id).is_none() {
                return Err(GatewayError::UnknownOrder(local_id.clone()));
            }
            let Some(venue_id) = inner
                .book
                .order(local_id)
                .and_then(|order| order.venue_id().cloned())
            else {
                tracing::warn!(order_id = %local_id, "Cancel dropped: venue id not yet learned");
                return Ok(());
            };

            let identity = inner.session.identity().clone();
            let mut fields = self.base_request();
            fields.push(("branch_no", self.config.branch_no.to_string()));
            fields.push(("client_id", identity.client_id));
            fields.push(("fund_account", self.config.account.clone()));
            fields.push(("password", self.config.credential.password().to_string()));
            fields.push(("entrust_no", venue_id.as_str().to_string()));
            fields.push(("entrust_reference", local_id.as_str().to_string()));

            (venue_id, fields)
        };

        let request_id = self
            .send_request(protocol::FUNCTION_CANCEL_ORDER, &fields)
            .await?;

        self.inner
            .lock()
            .correlation
            .record(request_id, CorrelationKey::Cancel(venue_id.clone()));

        tracing::info!(order_id = %local_id, venue_id = %venue_id, "Cancel sent");
        Ok(())
    }

    /// The common `op_*` prefix every request starts with.
    fn base_request(&self) -> Vec<(&'static str, String)> {
        vec![
            ("op_branch_no", "0".to_string()),
            ("op_entrust_way", self.config.entrust_way.clone()),
            ("op_station", self.config.station.clone()),
        ]
    }

    /// Base fields plus the session triple; `None` until logged in.
    fn authenticated_request(&self) -> Option<Vec<(&'static str, String)>> {
        let inner = self.inner.lock();
        if !inner.session.is_logged_in() {
            return None;
        }
        let identity = inner.session.identity().clone();
        drop(inner);

        let mut fields = self.base_request();
        fields.push(("branch_no", self.config.branch_no.to_string()));
        fields.push(("client_id", identity.client_id));
        fields.push(("fund_account", self.config.account.clone()));
        fields.push(("password", self.config.credential.password().to_string()));
        fields.push(("password_type", "2".to_string()));
        fields.push(("user_token", identity.user_token));
        Some(fields)
    }

    async fn send_request(
        &self,
        function: u32,
        fields: &[(&'static str, String)],
    ) -> Result<RequestId, GatewayError> {
        let payload = codec::encode_request(function, fields);
        let request_id = self.transport.send(payload).await?;
        tracing::debug!(function, request_id = %request_id, "Request sent");
        Ok(request_id)
    }

    // =========================================================================
    // Poll Timer
    // =========================================================================

    /// Advance the poll scheduler by one external timer tick.
    ///
    /// Ticks advance even while disconnected; the login guard inside the
    /// queries turns the call into a no-op rather than an error.
    pub async fn on_timer_tick(&self) {
        let operation = self.inner.lock().scheduler.on_tick();
        let Some(operation) = operation else { return };

        let result = match operation {
            PollOperation::QueryAccount => self.query_account().await,
            PollOperation::QueryPosition => self.query_position().await,
        };
        if let Err(error) = result {
            tracing::warn!(operation = ?operation, error = %error, "Poll query failed");
        }
    }

    /// Drive [`on_timer_tick`] from a tokio interval until cancelled.
    ///
    /// [`on_timer_tick`]: UfxClient::on_timer_tick
    pub async fn run_poll_timer(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = interval.tick() => self.on_timer_tick().await,
            }
        }
    }

    // =========================================================================
    // Reply Handlers
    // =========================================================================

    async fn on_login(&self, rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            tracing::warn!(error = %error, "Venue login failed");
            self.inner.lock().session.login_failed();
            self.emit(GatewayEvent::LogMessage(format!("Login failed: {error}")))
                .await;
            return;
        }

        let Some(reply) = LoginReply::from_rows(rows) else {
            // Success requires all three identity fields, even absent an
            // explicit error code.
            tracing::warn!("Login reply missing identity fields");
            self.inner.lock().session.login_failed();
            self.emit(GatewayEvent::LogMessage(
                "Login failed: incomplete identity in reply".to_string(),
            ))
            .await;
            return;
        };

        self.complete_login(reply).await;
    }

    /// Record the identity and run the login sweep: push subscriptions,
    /// contract queries per exchange, then the order query (which chains
    /// the trade query from its reply handler).
    async fn complete_login(&self, reply: LoginReply) {
        tracing::info!(session_no = %reply.session_no, "Venue login succeeded");
        self.inner.lock().session.complete_login(reply);
        self.emit(GatewayEvent::LogMessage("Venue login succeeded".to_string()))
            .await;

        // Subscription failures are non-fatal: the sweep continues.
        if let Err(error) = self.subscribe(protocol::ISSUE_TYPE_TRADE).await {
            tracing::warn!(error = %error, "Trade push subscription failed");
        }
        if let Err(error) = self.subscribe(protocol::ISSUE_TYPE_ORDER).await {
            tracing::warn!(error = %error, "Order push subscription failed");
        }

        for exchange in Exchange::ALL {
            if let Err(error) = self.query_contracts(exchange).await {
                tracing::warn!(exchange = %exchange, error = %error, "Contract query failed to send");
            }
        }

        if let Err(error) = self.query_orders().await {
            tracing::warn!(error = %error, "Order query failed to send");
        }
    }

    async fn on_query_contract(&self, rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            tracing::warn!(error = %error, "Contract query failed");
            return;
        }

        let mut contracts = Vec::new();
        for row in rows {
            match messages::parse_contract_row(row) {
                Ok(contract) => contracts.push(contract),
                Err(error) => tracing::warn!(error = %error, "Dropped malformed contract row"),
            }
        }

        let exchange = contracts.last().map(|contract| contract.exchange);
        {
            let mut inner = self.inner.lock();
            for contract in &contracts {
                inner.book.insert_contract(contract.clone());
            }
        }

        for contract in contracts {
            self.emit(GatewayEvent::ContractUpdated(Box::new(contract)))
                .await;
        }
        if let Some(exchange) = exchange {
            tracing::info!(exchange = %exchange, "Contract query succeeded");
        }
    }

    async fn on_query_account(&self, rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            tracing::warn!(error = %error, "Account query failed");
            return;
        }

        let client_id = self.inner.lock().session.identity().client_id.clone();
        for row in rows {
            match messages::parse_account_row(row, &client_id) {
                Ok(account) => self.emit(GatewayEvent::AccountUpdated(account)).await,
                Err(error) => tracing::warn!(error = %error, "Dropped malformed account row"),
            }
        }
    }

    async fn on_query_position(&self, rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            tracing::warn!(error = %error, "Position query failed");
            return;
        }

        for row in rows {
            match messages::parse_position_row(row) {
                Ok(position) => self.emit(GatewayEvent::PositionUpdated(position)).await,
                Err(error) => tracing::warn!(error = %error, "Dropped malformed position row"),
            }
        }
    }

    async fn on_query_order(&self, rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            tracing::warn!(error = %error, "Order query failed");
            return;
        }

        let mut updates = Vec::new();
        {
            let mut inner = self.inner.lock();
            for row in rows {
                // A zero report time means the order never reached the
                // venue book.
                if row.get("report_time").is_some_and(|time| time == "0") {
                    continue;
                }
                match messages::parse_order_query_row(row) {
                    Ok(snapshot) => {
                        if let Some(order) =
                            inner.book.apply_snapshot(snapshot, UpdateSource::Query)
                        {
                            updates.push(order);
                        }
                    }
                    Err(error) => tracing::warn!(error = %error, "Dropped malformed order row"),
                }
            }
        }

        for order in updates {
            self.emit_order(order).await;
        }
        tracing::info!("Order query succeeded");

        // Second half of the login sweep: fills for the orders just seen.
        if let Err(error) = self.query_trades().await {
            tracing::warn!(error = %error, "Trade query failed to send");
        }
    }

    async fn on_query_trade(&self, rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            tracing::warn!(error = %error, "Trade query failed");
            return;
        }

        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            for row in rows {
                if messages::is_cancel_record(row) {
                    continue;
                }
                let trade_row = match messages::parse_trade_query_row(row) {
                    Ok(trade_row) => trade_row,
                    Err(error) => {
                        tracing::warn!(error = %error, "Dropped malformed trade row");
                        continue;
                    }
                };

                let local_id = trade_row
                    .venue_id
                    .as_ref()
                    .and_then(|venue_id| inner.book.resolve_venue(venue_id).cloned())
                    .or(trade_row.local_id);
                let Some(local_id) = local_id else {
                    tracing::warn!(
                        trade_id = %trade_row.fill.trade_id,
                        "Trade for unknown order dropped"
                    );
                    continue;
                };

                match inner
                    .book
                    .apply_fill(&local_id, trade_row.fill, UpdateSource::Query)
                {
                    FillOutcome::Applied { trade, order } => {
                        events.push(GatewayEvent::TradeCreated(trade));
                        events.push(GatewayEvent::OrderUpdated(order));
                    }
                    FillOutcome::Duplicate | FillOutcome::DiscardedTerminal => {}
                    FillOutcome::UnknownOrder => {
                        tracing::warn!(order_id = %local_id, "Trade for unknown order dropped");
                    }
                }
            }
        }

        for event in events {
            self.emit(event).await;
        }
        tracing::info!("Trade query succeeded");
    }

    async fn on_send_order(&self, request_id: RequestId, rows: &[Row]) {
        let key = self.inner.lock().correlation.resolve(request_id);
        let Some(CorrelationKey::Order(local_id)) = key else {
            tracing::warn!(request_id = %request_id, "Send reply for unknown request dropped");
            return;
        };

        if let Some(error) = messages::venue_error(rows) {
            // A rejected send never reaches the venue book; the order is
            // terminal immediately.
            tracing::warn!(order_id = %local_id, error = %error, "Order rejected by venue");
            let rejected = self.inner.lock().book.reject(&local_id);
            if let Some(order) = rejected {
                self.emit_order(order).await;
            }
            self.emit(GatewayEvent::LogMessage(format!(
                "Order {local_id} rejected: {error}"
            )))
            .await;
            return;
        }

        let venue_id = rows
            .first()
            .and_then(|row| row.get("entrust_no"))
            .filter(|id| !id.is_empty());
        if let Some(venue_id) = venue_id {
            self.inner
                .lock()
                .book
                .learn_venue_id(&local_id, VenueOrderId::new(venue_id.clone()));
            tracing::debug!(order_id = %local_id, venue_id = %venue_id, "Venue id learned");
        } else {
            tracing::warn!(order_id = %local_id, "Send acknowledgement without entrust_no");
        }
    }

    async fn on_cancel_order(&self, request_id: RequestId, rows: &[Row]) {
        let key = self.inner.lock().correlation.resolve(request_id);
        let Some(CorrelationKey::Cancel(venue_id)) = key else {
            tracing::warn!(request_id = %request_id, "Cancel reply for unknown request dropped");
            return;
        };

        if let Some(error) = messages::venue_error(rows) {
            // Order stays in its last known state; re-query the venue's
            // system of record for this order instead of guessing.
            tracing::warn!(venue_id = %venue_id, error = %error, "Cancel failed; re-querying order");
            self.emit(GatewayEvent::LogMessage(format!(
                "Cancel of {venue_id} failed: {error}"
            )))
            .await;
            if let Err(send_error) = self
                .query_with_session(protocol::FUNCTION_QUERY_ORDER, Some(&venue_id))
                .await
            {
                tracing::warn!(error = %send_error, "Directed order query failed to send");
            }
            return;
        }

        // Cancel success is the absence of an error code; any status the
        // reply carries is ignored.
        let cancelled = self.inner.lock().book.force_cancelled(&venue_id);
        match cancelled {
            Some(order) => self.emit_order(order).await,
            None => {
                tracing::warn!(venue_id = %venue_id, "Cancel acknowledged for unknown order");
            }
        }
    }

    fn on_subscription(rows: &[Row]) {
        if let Some(error) = messages::venue_error(rows) {
            // Non-fatal: queries still cover the data, just more slowly.
            tracing::warn!(error = %error, "Push subscription rejected");
        } else {
            tracing::debug!("Push subscription confirmed");
        }
    }

    /// Combined push channel: one batch is either all order rows or all
    /// trade rows, told apart by the date field only trade rows carry.
    async fn on_push(&self, rows: &[Row]) {
        let is_trade_batch = rows
            .last()
            .is_some_and(|row| row.contains_key("init_date"));
        if is_trade_batch {
            self.on_trade_push(rows).await;
        } else {
            self.on_order_push(rows).await;
        }
    }

    async fn on_order_push(&self, rows: &[Row]) {
        let now = Utc::now();
        let mut updates = Vec::new();
        {
            let mut inner = self.inner.lock();
            for row in rows {
                if messages::is_cancel_echo(row) {
                    continue;
                }
                match messages::parse_order_push_row(row, now) {
                    Ok(snapshot) => {
                        if let Some(order) = inner.book.apply_snapshot(snapshot, UpdateSource::Push)
                        {
                            updates.push(order);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Dropped malformed order push row");
                    }
                }
            }
        }

        for order in updates {
            self.emit_order(order).await;
        }
    }

    async fn on_trade_push(&self, rows: &[Row]) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            for row in rows {
                let local_id = row
                    .get("entrust_reference")
                    .filter(|id| !id.is_empty())
                    .map(LocalOrderId::new);
                let Some(local_id) = local_id else {
                    tracing::warn!("Trade push row without entrust_reference dropped");
                    continue;
                };

                // A cancellation record carries no fill, but its status
                // still advances the order.
                if !messages::is_cancel_record(row) {
                    match messages::parse_trade_push_row(row) {
                        Ok(trade_row) => match inner.book.apply_fill(
                            &local_id,
                            trade_row.fill,
                            UpdateSource::Push,
                        ) {
                            FillOutcome::Applied { trade, order } => {
                                events.push(GatewayEvent::TradeCreated(trade));
                                events.push(GatewayEvent::OrderUpdated(order));
                            }
                            FillOutcome::Duplicate => {}
                            FillOutcome::DiscardedTerminal => {
                                tracing::debug!(
                                    order_id = %local_id,
                                    "Fill push for terminal order discarded"
                                );
                            }
                            FillOutcome::UnknownOrder => {
                                tracing::warn!(
                                    order_id = %local_id,
                                    "Trade push for unknown order dropped"
                                );
                            }
                        },
                        Err(error) => {
                            tracing::warn!(error = %error, "Dropped malformed trade push row");
                        }
                    }
                }

                if let Some(status_code) = row.get("entrust_status") {
                    let status = messages::parse_status(status_code);
                    if let Some(order) = inner.book.apply_push_status(&local_id, status) {
                        events.push(GatewayEvent::OrderUpdated(Box::new(order)));
                    }
                }
            }
        }

        for event in events {
            self.emit(event).await;
        }
    }
}
