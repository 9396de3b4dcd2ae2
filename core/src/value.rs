// SPDX-License-Identifier: PMPL-1.0-or-later
//! A type-erased column value that can be read from one PostgreSQL
//! connection and written back to another without knowing its Rust type.
//!
//! The synchronizer never needs to interpret column contents — it only
//! needs to move them and occasionally replace one with NULL. Decoding
//! every catalog type into a native Rust enum (and re-encoding it) would
//! be wasted work and a maintenance burden every time PostgreSQL adds a
//! type. Instead [`RawValue`] captures the wire bytes tokio-postgres
//! already received for a column and replays them verbatim against the
//! same column in the destination, which by assumption (§1: destination
//! schema pre-created) has the same catalog type.

use bytes::{Bytes, BytesMut};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};

#[derive(Debug, Clone)]
pub struct RawValue {
    ty: Type,
    bytes: Option<Bytes>,
}

impl RawValue {
    /// A NULL of the same catalog type, used for FK null-substitution.
    pub fn null_of(&self) -> RawValue {
        RawValue {
            ty: self.ty.clone(),
            bytes: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    pub fn pg_type(&self) -> &Type {
        &self.ty
    }
}

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue {
            ty: ty.clone(),
            bytes: Some(Bytes::copy_from_slice(raw)),
        })
    }

    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue {
            ty: ty.clone(),
            bytes: None,
        })
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl ToSql for RawValue {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match &self.bytes {
            Some(b) => {
                out.extend_from_slice(b);
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
