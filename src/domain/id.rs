//! Newtype identifiers for domain entities.
//!
//! Keeping each entity's id as a distinct type prevents accidentally passing a
//! [`UserTradeId`] where a [`RecommendationId`] is expected — both are `i64` under
//! the hood but the compiler will not let them mix.

use std::fmt;

macro_rules! int_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            #[must_use]
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

int_id!(RecommendationId);
int_id!(UserTradeId);
int_id!(ChannelId);
int_id!(UserId);
int_id!(WatchedChannelId);

/// Which entity family a trigger or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Recommendation,
    UserTrade,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Recommendation => write!(f, "recommendation"),
            EntityKind::UserTrade => write!(f, "user_trade"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let rec_id = RecommendationId::new(1);
        let trade_id = UserTradeId::new(1);
        assert_eq!(rec_id.value(), trade_id.value());
        assert_eq!(rec_id.to_string(), "1");
    }

    #[test]
    fn entity_kind_display() {
        assert_eq!(EntityKind::Recommendation.to_string(), "recommendation");
        assert_eq!(EntityKind::UserTrade.to_string(), "user_trade");
    }
}
