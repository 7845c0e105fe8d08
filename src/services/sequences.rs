//! Document number allocation.
//!
//! Numbers come from a per-kind counter row incremented inside the same
//! transaction that inserts the document, never from counting existing
//! rows: two concurrent creations counting rows would both read N and both
//! produce N+1.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entities::document_sequence::{self, Entity as DocumentSequence};
use crate::entities::DocumentKind;
use crate::errors::ServiceError;

/// Allocates the next document number for `kind` within `conn`'s
/// transaction. The row update takes a write lock on the counter, so a
/// concurrent allocation for the same kind serializes behind this one and
/// reads the already-incremented value.
pub async fn next_number<C: ConnectionTrait>(
    conn: &C,
    kind: DocumentKind,
) -> Result<String, ServiceError> {
    let updated = DocumentSequence::update_many()
        .col_expr(
            document_sequence::Column::NextValue,
            Expr::col(document_sequence::Column::NextValue).add(1),
        )
        .filter(document_sequence::Column::DocumentType.eq(kind.as_str()))
        .exec(conn)
        .await?;

    if updated.rows_affected != 1 {
        return Err(ServiceError::InternalError(format!(
            "sequence row missing for document kind '{}'",
            kind.as_str()
        )));
    }

    let row = DocumentSequence::find_by_id(kind.as_str().to_string())
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "sequence row vanished for document kind '{}'",
                kind.as_str()
            ))
        })?;

    // next_value now points one past the ordinal this call claimed
    Ok(format_number(kind, row.next_value - 1))
}

/// Renders an ordinal as `<PREFIX>-<5-digit zero-padded ordinal>`.
pub fn format_number(kind: DocumentKind, ordinal: i64) -> String {
    format!("{}-{:05}", kind.prefix(), ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_format_per_kind() {
        assert_eq!(format_number(DocumentKind::Receipt, 1), "REC-00001");
        assert_eq!(format_number(DocumentKind::Delivery, 42), "DEL-00042");
        assert_eq!(format_number(DocumentKind::Transfer, 123), "TRF-00123");
        assert_eq!(format_number(DocumentKind::Adjustment, 99999), "ADJ-99999");
    }

    #[test]
    fn number_format_past_five_digits_keeps_growing() {
        assert_eq!(format_number(DocumentKind::Receipt, 123456), "REC-123456");
    }
}
