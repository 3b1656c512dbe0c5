// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{NodeId, StatusCode, Variant};
use crate::flags::DataSetFieldContentFlags;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Value with status and timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub value: Variant,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub source_picoseconds: u16,
    pub server_timestamp: Option<DateTime<Utc>>,
    pub server_picoseconds: u16,
}

impl DataValue {
    pub fn new(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_source_timestamp(mut self, ts: DateTime<Utc>, picoseconds: u16) -> Self {
        self.source_timestamp = Some(ts);
        self.source_picoseconds = picoseconds;
        self
    }

    #[must_use]
    pub fn with_server_timestamp(mut self, ts: DateTime<Utc>, picoseconds: u16) -> Self {
        self.server_timestamp = Some(ts);
        self.server_picoseconds = picoseconds;
        self
    }

    /// Copy keeping only the sub-fields selected by `mask`.
    ///
    /// This is what a decoder can reproduce after encoding with `mask`.
    #[must_use]
    pub fn restrict(&self, mask: DataSetFieldContentFlags) -> Self {
        type F = DataSetFieldContentFlags;
        let keep_all = mask.is_empty() || mask.contains(F::RAW_DATA);
        Self {
            value: self.value.clone(),
            status: if !keep_all && mask.contains(F::STATUS_CODE) {
                self.status
            } else {
                StatusCode::GOOD
            },
            source_timestamp: if !keep_all && mask.contains(F::SOURCE_TIMESTAMP) {
                self.source_timestamp
            } else {
                None
            },
            source_picoseconds: if !keep_all && mask.contains(F::SOURCE_PICOSECONDS) {
                self.source_picoseconds
            } else {
                0
            },
            server_timestamp: if !keep_all && mask.contains(F::SERVER_TIMESTAMP) {
                self.server_timestamp
            } else {
                None
            },
            server_picoseconds: if !keep_all && mask.contains(F::SERVER_PICOSECONDS) {
                self.server_picoseconds
            } else {
                0
            },
        }
    }
}

impl From<Variant> for DataValue {
    fn from(value: Variant) -> Self {
        DataValue::new(value)
    }
}

// Good values without timestamps straight from Rust scalars.
macro_rules! impl_data_value_from {
    ($($type:ty),* $(,)?) => {
        $(
            impl From<$type> for DataValue {
                fn from(v: $type) -> Self {
                    DataValue::new(v)
                }
            }
        )*
    };
}

impl_data_value_from!(
    bool,
    i8,
    u8,
    i16,
    u16,
    i32,
    u32,
    i64,
    u64,
    f32,
    f64,
    String,
    &str,
    DateTime<Utc>,
    Uuid,
    Vec<u8>,
    NodeId,
    StatusCode,
);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_restrict_drops_unselected_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let dv = DataValue::new(1.5f64)
            .with_status(StatusCode::UNCERTAIN)
            .with_source_timestamp(ts, 7)
            .with_server_timestamp(ts, 9);

        let r = dv.restrict(DataSetFieldContentFlags::STATUS_CODE);
        assert_eq!(r.status, StatusCode::UNCERTAIN);
        assert_eq!(r.source_timestamp, None);
        assert_eq!(r.server_picoseconds, 0);

        let r = dv.restrict(DataSetFieldContentFlags::RAW_DATA);
        assert_eq!(r, DataValue::new(1.5f64));

        assert_eq!(dv.restrict(DataSetFieldContentFlags::data_value_fields()), dv);
    }
}
