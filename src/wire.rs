use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo, QueryResponse,
    Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::InnkeepAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, SqlError};

pub struct InnkeepHandler {
    engine: Arc<Engine>,
    query_parser: Arc<InnkeepQueryParser>,
}

impl InnkeepHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(InnkeepQueryParser),
        }
    }

    /// Run one command with query metrics around it.
    async fn run(&self, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Response> {
        let engine = &self.engine;
        match cmd {
            Command::InsertRoomType {
                name,
                base_price,
                max_occupancy,
            } => {
                let t = engine
                    .add_room_type(&name, base_price, max_occupancy)
                    .await
                    .map_err(engine_err)?;
                Ok(room_type_rows(vec![t]))
            }
            Command::InsertGuest { name, mobile, email } => {
                let g = engine
                    .register_guest(&name, &mobile, email.as_deref())
                    .await
                    .map_err(engine_err)?;
                Ok(guest_rows(vec![g]))
            }
            Command::InsertRoom {
                number,
                floor,
                type_id,
                status,
            } => {
                let room = engine
                    .create_room(&number, floor, type_id, status)
                    .await
                    .map_err(engine_err)?;
                Ok(room_rows(vec![room]))
            }
            Command::UpdateRoom { id, patch } => {
                let room = engine.update_room(id, patch).await.map_err(engine_err)?;
                Ok(room_rows(vec![room]))
            }
            Command::SetRoomStatus { id, status } => {
                let room = engine.set_room_status(id, status).await.map_err(engine_err)?;
                Ok(room_rows(vec![room]))
            }
            Command::DeleteRoom { id } => {
                engine.delete_room(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertBooking(req) => {
                let b = engine.create_booking(req).await.map_err(engine_err)?;
                Ok(booking_rows(vec![b]))
            }
            Command::CheckIn { id, room_id } => {
                let b = engine.check_in(id, room_id).await.map_err(engine_err)?;
                Ok(booking_rows(vec![b]))
            }
            Command::CheckOut { id } => {
                let b = engine.check_out(id).await.map_err(engine_err)?;
                Ok(booking_rows(vec![b]))
            }
            Command::CancelBooking { id } => {
                let b = engine.cancel_booking(id).await.map_err(engine_err)?;
                Ok(booking_rows(vec![b]))
            }
            Command::AmendBooking { id, patch } => {
                let b = engine.amend_booking(id, patch).await.map_err(engine_err)?;
                Ok(booking_rows(vec![b]))
            }
            Command::SelectBookings { id, filter } => {
                let bookings = match id {
                    Some(id) => {
                        let b = engine.get_booking(id).await.map_err(engine_err)?;
                        filter.matches(&b).then_some(b).into_iter().collect()
                    }
                    None => engine.list_bookings(filter).await,
                };
                Ok(booking_rows(bookings))
            }
            Command::SelectRooms { id, filter } => {
                let rooms = match id {
                    Some(id) => {
                        let r = engine.get_room(id).await.map_err(engine_err)?;
                        filter.matches(&r).then_some(r).into_iter().collect()
                    }
                    None => engine.list_rooms(filter).await,
                };
                Ok(room_rows(rooms))
            }
            Command::SelectRoomTypes => Ok(room_type_rows(engine.list_room_types())),
            Command::SelectGuests { id } => {
                let guests = match id {
                    Some(id) => vec![engine.get_guest(id).map_err(engine_err)?],
                    None => engine.list_guests(),
                };
                Ok(guest_rows(guests))
            }
            Command::SelectAvailability {
                room_id,
                check_in,
                check_out,
            } => {
                let answer = engine
                    .check_availability(room_id, check_in, check_out)
                    .await
                    .map_err(engine_err)?;
                let conflicting = match answer {
                    Availability::Available => None,
                    Availability::Conflict(booking_id) => Some(booking_id),
                };
                let schema = Arc::new(availability_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&room_id)?;
                encoder.encode_field(&check_in.to_string())?;
                encoder.encode_field(&check_out.to_string())?;
                encoder.encode_field(&answer.is_available())?;
                encoder.encode_field(&conflicting)?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectAvailableRooms {
                check_in,
                check_out,
                type_id,
            } => {
                let rooms = engine
                    .available_rooms(check_in, check_out, type_id)
                    .await
                    .map_err(engine_err)?;
                Ok(room_rows(rooms))
            }
            Command::SelectFrontDesk { date } => {
                let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
                let summary = engine.front_desk(date).await;
                Ok(front_desk_rows(&summary))
            }
        }
    }
}

// ── Result sets ──────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("guest_id", Type::INT8),
        field("room_id", Type::INT8),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("nights", Type::INT8),
        field("total_amount", Type::VARCHAR),
        field("paid_amount", Type::VARCHAR),
        field("balance_due", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("created_at", Type::VARCHAR),
    ]
}

fn room_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("number", Type::VARCHAR),
        field("floor", Type::INT4),
        field("type_id", Type::INT8),
        field("status", Type::VARCHAR),
    ]
}

fn room_type_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("name", Type::VARCHAR),
        field("base_price", Type::VARCHAR),
        field("max_occupancy", Type::INT8),
    ]
}

fn guest_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("name", Type::VARCHAR),
        field("mobile", Type::VARCHAR),
        field("email", Type::VARCHAR),
        field("registered_at", Type::VARCHAR),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::INT8),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("available", Type::BOOL),
        field("conflicting_booking_id", Type::INT8),
    ]
}

fn front_desk_schema() -> Vec<FieldInfo> {
    [
        "total_rooms",
        "vacant",
        "occupied",
        "dirty",
        "maintenance",
        "arrivals",
        "departures",
        "in_house",
    ]
    .into_iter()
    .fold(vec![field("date", Type::VARCHAR)], |mut fields, name| {
        fields.push(field(name, Type::INT8));
        fields
    })
}

/// Encode `items` as one row each under `schema`.
fn rows<T>(
    schema: Vec<FieldInfo>,
    items: Vec<T>,
    encode: impl Fn(&mut DataRowEncoder, &T) -> PgWireResult<()>,
) -> Response {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn booking_rows(bookings: Vec<Booking>) -> Response {
    rows(booking_schema(), bookings, |e, b| {
        e.encode_field(&b.id)?;
        e.encode_field(&b.guest_id)?;
        e.encode_field(&b.room_id)?;
        e.encode_field(&b.stay.check_in.to_string())?;
        e.encode_field(&b.stay.check_out.to_string())?;
        e.encode_field(&b.stay.nights())?;
        e.encode_field(&b.total_amount.to_string())?;
        e.encode_field(&b.paid_amount.to_string())?;
        e.encode_field(&b.balance_due().to_string())?;
        e.encode_field(&b.status.to_string())?;
        e.encode_field(&b.created_at.to_rfc3339())
    })
}

fn room_rows(rooms: Vec<Room>) -> Response {
    rows(room_schema(), rooms, |e, r| {
        e.encode_field(&r.id)?;
        e.encode_field(&r.number)?;
        e.encode_field(&r.floor)?;
        e.encode_field(&r.type_id)?;
        e.encode_field(&r.status.to_string())
    })
}

fn room_type_rows(types: Vec<RoomType>) -> Response {
    rows(room_type_schema(), types, |e, t| {
        e.encode_field(&t.id)?;
        e.encode_field(&t.name)?;
        e.encode_field(&t.base_price.to_string())?;
        e.encode_field(&i64::from(t.max_occupancy))
    })
}

fn guest_rows(guests: Vec<Guest>) -> Response {
    rows(guest_schema(), guests, |e, g| {
        e.encode_field(&g.id)?;
        e.encode_field(&g.name)?;
        e.encode_field(&g.mobile)?;
        e.encode_field(&g.email)?;
        e.encode_field(&g.registered_at.to_rfc3339())
    })
}

fn front_desk_rows(s: &FrontDeskSummary) -> Response {
    let counts = [
        s.total_rooms,
        s.vacant,
        s.occupied,
        s.dirty,
        s.maintenance,
        s.arrivals,
        s.departures,
        s.in_house,
    ];
    rows(front_desk_schema(), vec![(s.date, counts)], |e, (date, counts)| {
        e.encode_field(&date.map(|d| d.to_string()))?;
        for n in counts {
            e.encode_field(&(*n as i64))?;
        }
        Ok(())
    })
}

/// Row description for a statement, decided from its leading keywords so it
/// works on unbound `$n` placeholders. Writes return the row they touched.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let mut words = sql.split_whitespace().map(|w| w.to_lowercase());
    let table = match words.next().as_deref() {
        Some("select") => words.skip_while(|w| w != "from").nth(1),
        Some("insert") => words.skip_while(|w| w != "into").nth(1),
        Some("update") => words.next(),
        _ => None,
    };
    let table: String = table
        .unwrap_or_default()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '"')
        .filter(|c| *c != '"')
        .collect();
    match table.as_str() {
        "bookings" => booking_schema(),
        "rooms" | "available_rooms" => room_schema(),
        "room_types" => room_type_schema(),
        "guests" => guest_schema(),
        "availability" => availability_schema(),
        "front_desk" => front_desk_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for InnkeepHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct InnkeepQueryParser;

#[async_trait]
impl QueryParser for InnkeepQueryParser {
    type Statement = String;

    async fn parse_sql<C>(&self, _client: &C, sql: &str, _types: &[Option<Type>]) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(&self, stmt: &String, _column_format: Option<&Format>) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for InnkeepHandler {
    type Statement = String;
    type QueryParser = InnkeepQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = bind_params(&portal.statement.statement, &portal.parameters);
        self.run(&sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
    }
}

/// `$N` placeholders outside quoted literals and identifiers, as
/// `(byte range, N)` in statement order.
fn placeholders(sql: &str) -> Vec<(std::ops::Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            // A doubled quote inside a literal closes and reopens it.
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'$' => {
                let start = i;
                let mut end = i + 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if let Ok(n) = sql[start + 1..end].parse::<usize>() {
                    found.push((start..end, n));
                }
                i = end;
                continue;
            }
            None => {}
        }
        i += 1;
    }
    found
}

/// Highest `$N` placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Splice bound values into `sql` as quoted text in a single pass, so a
/// value that itself contains `$N` is never expanded again.
fn bind_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|i| params.get(i)) else {
            continue;
        };
        out.push_str(&sql[copied..range.start]);
        match param {
            Some(bytes) => {
                out.push('\'');
                out.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                out.push('\'');
            }
            None => out.push_str("NULL"),
        }
        copied = range.end;
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct InnkeepFactory {
    handler: Arc<InnkeepHandler>,
    auth_handler: Arc<CleartextPasswordAuthStartupHandler<InnkeepAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl InnkeepFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = InnkeepAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(InnkeepHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(auth_source, param_provider)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for InnkeepFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(InnkeepFactory::new(engine, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    if matches!(e, EngineError::Wal(_)) {
        tracing::error!("storage failure: {e}");
    }
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        e.sqlstate().into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
