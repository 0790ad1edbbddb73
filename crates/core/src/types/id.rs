//! Newtype IDs for type-safe entity references.
//!
//! Every table uses a `SERIAL` primary key. The `define_id!` macro wraps those
//! integers so a ticket type ID can never be passed where a merchandise ID is
//! expected, even though both are plain `i32` in the database.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use ticket_booth_core::define_id;
/// define_id!(VenueId);
/// define_id!(SeatId);
///
/// let venue = VenueId::new(1);
/// let seat = SeatId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: VenueId = seat;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(EventId);
define_id!(TicketTypeId);
define_id!(MerchandiseId);
define_id!(CartId);
define_id!(OrderId);
define_id!(AttendeeId);
define_id!(EmailLogId);

impl TicketTypeId {
    /// View this ticket type as a catalog reference.
    #[must_use]
    pub const fn as_item(self) -> crate::catalog::ItemRef {
        crate::catalog::ItemRef::ticket(self.0)
    }
}

impl MerchandiseId {
    /// View this merchandise item as a catalog reference.
    #[must_use]
    pub const fn as_item(self) -> crate::catalog::ItemRef {
        crate::catalog::ItemRef::merchandise(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = OrderId::new(42);
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("42"));
    }

    #[test]
    fn test_id_display_and_conversions() {
        let id = TicketTypeId::from(7);
        assert_eq!(id.to_string(), "7");
        assert_eq!(i32::from(id), 7);
        assert_eq!(id.as_i32(), 7);
    }
}
