use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoomType {
        name: String,
        base_price: Decimal,
        max_occupancy: u32,
    },
    InsertGuest {
        name: String,
        mobile: String,
        email: Option<String>,
    },
    InsertRoom {
        number: String,
        floor: Option<i32>,
        type_id: RoomTypeId,
        status: Option<RoomStatus>,
    },
    UpdateRoom {
        id: RoomId,
        patch: RoomPatch,
    },
    SetRoomStatus {
        id: RoomId,
        status: RoomStatus,
    },
    DeleteRoom {
        id: RoomId,
    },
    InsertBooking(NewBooking),
    CheckIn {
        id: BookingId,
        room_id: Option<RoomId>,
    },
    CheckOut {
        id: BookingId,
    },
    CancelBooking {
        id: BookingId,
    },
    AmendBooking {
        id: BookingId,
        patch: BookingPatch,
    },
    SelectBookings {
        id: Option<BookingId>,
        filter: BookingFilter,
    },
    SelectRooms {
        id: Option<RoomId>,
        filter: RoomFilter,
    },
    SelectRoomTypes,
    SelectGuests {
        id: Option<GuestId>,
    },
    SelectAvailability {
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    SelectAvailableRooms {
        check_in: NaiveDate,
        check_out: NaiveDate,
        type_id: Option<RoomTypeId>,
    },
    SelectFrontDesk {
        date: Option<NaiveDate>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

const ROOM_TYPE_COLUMNS: &[&str] = &["name", "base_price", "max_occupancy"];
const GUEST_COLUMNS: &[&str] = &["name", "mobile", "email"];
const ROOM_COLUMNS: &[&str] = &["number", "floor", "type_id", "status"];
const BOOKING_COLUMNS: &[&str] = &[
    "guest_id",
    "room_id",
    "check_in",
    "check_out",
    "total_amount",
    "paid_amount",
];

/// Column → value for the first VALUES row. Without a column list, values
/// are taken positionally in the table's default column order.
fn insert_row<'a>(
    insert: &'a ast::Insert,
    table: &'static str,
    default_columns: &[&'static str],
) -> Result<HashMap<String, &'a Expr>, SqlError> {
    let values = extract_insert_values(insert)?;
    let columns: Vec<String> = if insert.columns.is_empty() {
        default_columns.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    // Positional rows may omit trailing columns; named ones must line up.
    let arity_ok = if insert.columns.is_empty() {
        values.len() <= columns.len()
    } else {
        values.len() == columns.len()
    };
    if !arity_ok {
        return Err(SqlError::WrongArity(table, columns.len(), values.len()));
    }

    let mut row = HashMap::new();
    for (col, value) in columns.into_iter().zip(values) {
        if !default_columns.contains(&col.as_str()) {
            return Err(SqlError::UnknownColumn(table, col));
        }
        row.insert(col, value);
    }
    Ok(row)
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "room_types" => {
            let row = insert_row(insert, "room_types", ROOM_TYPE_COLUMNS)?;
            Ok(Command::InsertRoomType {
                name: required(&row, "name", parse_text)?,
                base_price: optional(&row, "base_price", parse_decimal)?.unwrap_or(Decimal::ZERO),
                max_occupancy: optional(&row, "max_occupancy", parse_u32)?.unwrap_or(1),
            })
        }
        "guests" => {
            let row = insert_row(insert, "guests", GUEST_COLUMNS)?;
            Ok(Command::InsertGuest {
                name: required(&row, "name", parse_text)?,
                mobile: required(&row, "mobile", parse_text)?,
                email: optional(&row, "email", parse_text)?,
            })
        }
        "rooms" => {
            let row = insert_row(insert, "rooms", ROOM_COLUMNS)?;
            Ok(Command::InsertRoom {
                number: required(&row, "number", parse_text)?,
                floor: optional(&row, "floor", parse_i32)?,
                type_id: required(&row, "type_id", parse_i64)?,
                status: optional(&row, "status", parse_enum::<RoomStatus>)?,
            })
        }
        "bookings" => {
            let row = insert_row(insert, "bookings", BOOKING_COLUMNS)?;
            // Missing required fields are left for the engine to reject.
            Ok(Command::InsertBooking(NewBooking {
                guest_id: optional(&row, "guest_id", parse_i64)?,
                room_id: optional(&row, "room_id", parse_i64)?,
                check_in: optional(&row, "check_in", parse_date)?,
                check_out: optional(&row, "check_out", parse_date)?,
                total_amount: optional(&row, "total_amount", parse_decimal)?,
                paid_amount: optional(&row, "paid_amount", parse_decimal)?,
            }))
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    let id = extract_where_id(selection)?;

    let mut set: Vec<(String, &Expr)> = Vec::with_capacity(assignments.len());
    for a in assignments {
        let col = match &a.target {
            AssignmentTarget::ColumnName(name) => {
                object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))?
            }
            AssignmentTarget::Tuple(_) => return Err(SqlError::Unsupported("tuple assignment".into())),
        };
        set.push((col, &a.value));
    }
    if set.is_empty() {
        return Err(SqlError::Parse("UPDATE without SET".into()));
    }

    match table.as_str() {
        "rooms" => parse_room_update(id, &set),
        "bookings" => parse_booking_update(id, &set),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_room_update(id: RoomId, set: &[(String, &Expr)]) -> Result<Command, SqlError> {
    if let Some((_, value)) = set.iter().find(|(c, _)| c == "status") {
        if set.len() > 1 {
            return Err(SqlError::Unsupported("room status must be set on its own".into()));
        }
        return Ok(Command::SetRoomStatus {
            id,
            status: parse_enum(value)?,
        });
    }

    let mut patch = RoomPatch::default();
    for (col, value) in set {
        match col.as_str() {
            "number" => patch.number = Some(parse_text(value)?),
            "floor" => patch.floor = Some(parse_i32(value)?),
            "type_id" => patch.type_id = Some(parse_i64(value)?),
            _ => return Err(SqlError::UnknownColumn("rooms", col.clone())),
        }
    }
    Ok(Command::UpdateRoom { id, patch })
}

/// Status-only updates map onto the lifecycle operations; anything else is
/// an amendment.
fn parse_booking_update(id: BookingId, set: &[(String, &Expr)]) -> Result<Command, SqlError> {
    let mut patch = BookingPatch::default();
    for (col, value) in set {
        match col.as_str() {
            "room_id" => patch.room_id = Some(parse_nullable(value, parse_i64)?),
            "check_in" => patch.check_in = Some(parse_date(value)?),
            "check_out" => patch.check_out = Some(parse_date(value)?),
            "total_amount" => patch.total_amount = Some(parse_decimal(value)?),
            "paid_amount" => patch.paid_amount = Some(parse_decimal(value)?),
            "status" => patch.status = Some(parse_enum(value)?),
            _ => return Err(SqlError::UnknownColumn("bookings", col.clone())),
        }
    }

    let only_status = BookingPatch {
        status: patch.status,
        ..Default::default()
    };
    match patch.status {
        Some(BookingStatus::CheckedIn) if matches!(patch.room_id, None | Some(Some(_))) => {
            let room_only = BookingPatch {
                room_id: patch.room_id,
                ..only_status.clone()
            };
            if patch == room_only {
                return Ok(Command::CheckIn {
                    id,
                    room_id: patch.room_id.flatten(),
                });
            }
        }
        Some(BookingStatus::CheckedOut) if patch == only_status => return Ok(Command::CheckOut { id }),
        Some(BookingStatus::Cancelled) if patch == only_status => return Ok(Command::CancelBooking { id }),
        _ => {}
    }
    Ok(Command::AmendBooking { id, patch })
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "bookings" => Ok(Command::CancelBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters: HashMap<String, &Expr> = HashMap::new();
    if let Some(selection) = &select.selection {
        collect_equalities(selection, &mut filters)?;
    }
    let allow = |known: &[&str], table: &'static str| -> Result<(), SqlError> {
        match filters.keys().find(|k| !known.contains(&k.as_str())) {
            Some(col) => Err(SqlError::UnknownColumn(table, col.clone())),
            None => Ok(()),
        }
    };

    match table.as_str() {
        "bookings" => {
            allow(&["id", "status", "date", "room_id", "guest_id"], "bookings")?;
            Ok(Command::SelectBookings {
                id: optional(&filters, "id", parse_i64)?,
                filter: BookingFilter {
                    status: optional(&filters, "status", parse_enum::<BookingStatus>)?,
                    date: optional(&filters, "date", parse_date)?,
                    room_id: optional(&filters, "room_id", parse_i64)?,
                    guest_id: optional(&filters, "guest_id", parse_i64)?,
                },
            })
        }
        "rooms" => {
            allow(&["id", "status", "type_id"], "rooms")?;
            Ok(Command::SelectRooms {
                id: optional(&filters, "id", parse_i64)?,
                filter: RoomFilter {
                    type_id: optional(&filters, "type_id", parse_i64)?,
                    status: optional(&filters, "status", parse_enum::<RoomStatus>)?,
                },
            })
        }
        "room_types" => {
            allow(&[], "room_types")?;
            Ok(Command::SelectRoomTypes)
        }
        "guests" => {
            allow(&["id"], "guests")?;
            Ok(Command::SelectGuests {
                id: optional(&filters, "id", parse_i64)?,
            })
        }
        "availability" => {
            allow(&["room_id", "check_in", "check_out"], "availability")?;
            Ok(Command::SelectAvailability {
                room_id: optional(&filters, "room_id", parse_i64)?.ok_or(SqlError::MissingFilter("room_id"))?,
                check_in: optional(&filters, "check_in", parse_date)?.ok_or(SqlError::MissingFilter("check_in"))?,
                check_out: optional(&filters, "check_out", parse_date)?
                    .ok_or(SqlError::MissingFilter("check_out"))?,
            })
        }
        "available_rooms" => {
            allow(&["check_in", "check_out", "type_id"], "available_rooms")?;
            Ok(Command::SelectAvailableRooms {
                check_in: optional(&filters, "check_in", parse_date)?.ok_or(SqlError::MissingFilter("check_in"))?,
                check_out: optional(&filters, "check_out", parse_date)?
                    .ok_or(SqlError::MissingFilter("check_out"))?,
                type_id: optional(&filters, "type_id", parse_i64)?,
            })
        }
        "front_desk" => {
            allow(&["date"], "front_desk")?;
            Ok(Command::SelectFrontDesk {
                date: optional(&filters, "date", parse_date)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = 1 AND b = 'x'` into column → value.
fn collect_equalities<'a>(expr: &'a Expr, out: &mut HashMap<String, &'a Expr>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_equalities(left, out)?;
            collect_equalities(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left).ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
            out.insert(col, right.as_ref());
            Ok(())
        }
        Expr::Nested(inner) => collect_equalities(inner, out),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<i64, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_i64(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

/// Literal behind `expr`, looking through `'...'::type` casts and parentheses.
fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        Expr::Cast { expr, .. } | Expr::Nested(expr) => extract_value(expr),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn literal_text(expr: &Expr) -> Result<String, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr: inner,
    } = expr
    {
        return Ok(format!("-{}", literal_text(inner)?));
    }
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected literal, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    literal_text(expr)
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    let s = literal_text(expr)?;
    s.trim().parse().map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}")))
}

fn parse_i32(expr: &Expr) -> Result<i32, SqlError> {
    let v = parse_i64(expr)?;
    i32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of i32 range")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_decimal(expr: &Expr) -> Result<Decimal, SqlError> {
    let s = literal_text(expr)?;
    Decimal::from_str(s.trim()).map_err(|e| SqlError::Parse(format!("bad amount {s:?}: {e}")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = literal_text(expr)?;
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_enum<T: FromStr>(expr: &Expr) -> Result<T, SqlError> {
    let s = literal_text(expr)?;
    s.trim().parse().map_err(|_| SqlError::Parse(format!("bad status {s:?}")))
}

fn parse_nullable<T>(expr: &Expr, parse: fn(&Expr) -> Result<T, SqlError>) -> Result<Option<T>, SqlError> {
    if is_null(expr) { Ok(None) } else { parse(expr).map(Some) }
}

/// Value of `col` if present and not NULL.
fn optional<T>(
    row: &HashMap<String, &Expr>,
    col: &str,
    parse: fn(&Expr) -> Result<T, SqlError>,
) -> Result<Option<T>, SqlError> {
    match row.get(col) {
        Some(expr) => parse_nullable(expr, parse),
        None => Ok(None),
    }
}

fn required<T>(
    row: &HashMap<String, &Expr>,
    col: &'static str,
    parse: fn(&Expr) -> Result<T, SqlError>,
) -> Result<T, SqlError> {
    optional(row, col, parse)?.ok_or(SqlError::MissingColumn(col))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: unknown column {1}")]
    UnknownColumn(&'static str, String),
    #[error("{0}: expected {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn parse_insert_room_type() {
        let sql = "INSERT INTO room_types (name, base_price, max_occupancy) VALUES ('Deluxe', 149.50, 3)";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertRoomType {
                name: "Deluxe".into(),
                base_price: Decimal::new(14950, 2),
                max_occupancy: 3,
            }
        );
    }

    #[test]
    fn parse_insert_guest_with_null_email() {
        let sql = "INSERT INTO guests (name, mobile, email) VALUES ('Ada', '+15550100', NULL)";
        match parse_sql(sql).unwrap() {
            Command::InsertGuest { name, mobile, email } => {
                assert_eq!(name, "Ada");
                assert_eq!(mobile, "+15550100");
                assert_eq!(email, None);
            }
            cmd => panic!("expected InsertGuest, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_room_named_columns_any_order() {
        let sql = "INSERT INTO rooms (type_id, number) VALUES (2, '101')";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertRoom {
                number: "101".into(),
                floor: None,
                type_id: 2,
                status: None,
            }
        );
    }

    #[test]
    fn parse_insert_room_positional() {
        let sql = "INSERT INTO rooms VALUES ('204', 2, 1, 'maintenance')";
        match parse_sql(sql).unwrap() {
            Command::InsertRoom { floor, status, .. } => {
                assert_eq!(floor, Some(2));
                assert_eq!(status, Some(RoomStatus::Maintenance));
            }
            cmd => panic!("expected InsertRoom, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking() {
        let sql = "INSERT INTO bookings (guest_id, room_id, check_in, check_out, paid_amount) \
                   VALUES (7, 101, '2024-01-10', '2024-01-12', '50.00')";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertBooking(NewBooking {
                guest_id: Some(7),
                room_id: Some(101),
                check_in: Some(d("2024-01-10")),
                check_out: Some(d("2024-01-12")),
                total_amount: None,
                paid_amount: Some(Decimal::new(5000, 2)),
            })
        );
    }

    #[test]
    fn parse_insert_booking_unassigned_with_cast() {
        let sql = "INSERT INTO bookings (guest_id, room_id, check_in, check_out) \
                   VALUES (7, NULL, '2024-01-10'::date, '2024-01-12'::date)";
        match parse_sql(sql).unwrap() {
            Command::InsertBooking(req) => {
                assert_eq!(req.room_id, None);
                assert_eq!(req.check_in, Some(d("2024-01-10")));
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_rejects_unknown_column_and_bad_date() {
        assert!(matches!(
            parse_sql("INSERT INTO rooms (number, colour) VALUES ('1', 'red')"),
            Err(SqlError::UnknownColumn("rooms", _))
        ));
        assert!(matches!(
            parse_sql("INSERT INTO bookings (guest_id, check_in) VALUES (1, '2024-13-01')"),
            Err(SqlError::Parse(_))
        ));
        assert!(matches!(
            parse_sql("INSERT INTO guests (name) VALUES ('Ada')"),
            Err(SqlError::MissingColumn("mobile"))
        ));
    }

    #[test]
    fn parse_room_updates() {
        assert_eq!(
            parse_sql("UPDATE rooms SET status = 'DIRTY' WHERE id = 4").unwrap(),
            Command::SetRoomStatus {
                id: 4,
                status: RoomStatus::Dirty,
            }
        );
        assert_eq!(
            parse_sql("UPDATE rooms SET number = '401', floor = 4 WHERE id = 4").unwrap(),
            Command::UpdateRoom {
                id: 4,
                patch: RoomPatch {
                    number: Some("401".into()),
                    floor: Some(4),
                    type_id: None,
                },
            }
        );
        assert!(parse_sql("UPDATE rooms SET status = 'VACANT', floor = 2 WHERE id = 4").is_err());
        assert!(matches!(
            parse_sql("UPDATE rooms SET status = 'VACANT'"),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn parse_booking_status_updates_map_to_lifecycle() {
        assert_eq!(
            parse_sql("UPDATE bookings SET status = 'CHECKED_IN' WHERE id = 9").unwrap(),
            Command::CheckIn { id: 9, room_id: None }
        );
        assert_eq!(
            parse_sql("UPDATE bookings SET status = 'CHECKED_IN', room_id = 3 WHERE id = 9").unwrap(),
            Command::CheckIn { id: 9, room_id: Some(3) }
        );
        assert_eq!(
            parse_sql("UPDATE bookings SET status = 'checked_out' WHERE id = 9").unwrap(),
            Command::CheckOut { id: 9 }
        );
        assert_eq!(
            parse_sql("UPDATE bookings SET status = 'CANCELLED' WHERE id = 9").unwrap(),
            Command::CancelBooking { id: 9 }
        );
        assert_eq!(
            parse_sql("DELETE FROM bookings WHERE id = 9").unwrap(),
            Command::CancelBooking { id: 9 }
        );
    }

    #[test]
    fn parse_booking_amend() {
        let cmd = parse_sql(
            "UPDATE bookings SET check_out = '2024-01-15', paid_amount = 120, room_id = NULL WHERE id = 9",
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::AmendBooking {
                id: 9,
                patch: BookingPatch {
                    room_id: Some(None),
                    check_out: Some(d("2024-01-15")),
                    paid_amount: Some(Decimal::new(120, 0)),
                    ..Default::default()
                },
            }
        );

        // A status change alongside other fields stays an amendment.
        let cmd = parse_sql("UPDATE bookings SET status = 'CHECKED_OUT', paid_amount = 200 WHERE id = 9").unwrap();
        assert!(matches!(cmd, Command::AmendBooking { .. }));
    }

    #[test]
    fn parse_delete_room() {
        assert_eq!(
            parse_sql("DELETE FROM rooms WHERE id = 12").unwrap(),
            Command::DeleteRoom { id: 12 }
        );
        assert!(matches!(
            parse_sql("DELETE FROM guests WHERE id = 1"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_select_bookings_filters() {
        let cmd = parse_sql(
            "SELECT * FROM bookings WHERE status = 'CONFIRMED' AND date = '2024-01-11' AND room_id = 3",
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::SelectBookings {
                id: None,
                filter: BookingFilter {
                    status: Some(BookingStatus::Confirmed),
                    date: Some(d("2024-01-11")),
                    room_id: Some(3),
                    guest_id: None,
                },
            }
        );
        assert_eq!(
            parse_sql("SELECT * FROM bookings WHERE id = 5").unwrap(),
            Command::SelectBookings {
                id: Some(5),
                filter: BookingFilter::default(),
            }
        );
        assert!(matches!(
            parse_sql("SELECT * FROM bookings WHERE colour = 'red'"),
            Err(SqlError::UnknownColumn("bookings", _))
        ));
    }

    #[test]
    fn parse_select_availability() {
        let sql = "SELECT * FROM availability WHERE room_id = 1 AND check_in = '2024-01-10' AND check_out = '2024-01-12'";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectAvailability {
                room_id: 1,
                check_in: d("2024-01-10"),
                check_out: d("2024-01-12"),
            }
        );
        assert!(matches!(
            parse_sql("SELECT * FROM availability WHERE room_id = 1"),
            Err(SqlError::MissingFilter("check_in"))
        ));
    }

    #[test]
    fn parse_select_available_rooms_and_front_desk() {
        let sql = "SELECT * FROM available_rooms WHERE check_in = '2024-01-10' AND check_out = '2024-01-12' AND type_id = 2";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectAvailableRooms {
                check_in: d("2024-01-10"),
                check_out: d("2024-01-12"),
                type_id: Some(2),
            }
        );
        assert_eq!(
            parse_sql("SELECT * FROM front_desk").unwrap(),
            Command::SelectFrontDesk { date: None }
        );
    }

    #[test]
    fn parse_select_catalog_tables() {
        assert_eq!(parse_sql("SELECT * FROM room_types").unwrap(), Command::SelectRoomTypes);
        assert_eq!(
            parse_sql("SELECT * FROM guests WHERE id = 3").unwrap(),
            Command::SelectGuests { id: Some(3) }
        );
        assert_eq!(
            parse_sql("SELECT * FROM rooms WHERE status = 'vacant'").unwrap(),
            Command::SelectRooms {
                id: None,
                filter: RoomFilter {
                    type_id: None,
                    status: Some(RoomStatus::Vacant),
                },
            }
        );
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("SELECT * FROM foobar"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
