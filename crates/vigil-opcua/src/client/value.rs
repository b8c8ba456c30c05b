// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Values, status codes and samples exchanged with the session.

use std::fmt;

use chrono::{DateTime, Utc};

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
///
/// The top two bits carry the severity: `0x80000000` marks a bad result and
/// `0x40000000` an uncertain one. Everything else with those bits clear is good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

impl StatusCode {
    /// The good status.
    pub const GOOD: Self = Self(0);

    /// `Bad_Timeout`.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);

    /// `Bad_NodeIdUnknown`.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);

    /// `Bad_MonitoredItemIdInvalid`.
    pub const BAD_MONITORED_ITEM_ID_INVALID: Self = Self(0x8042_0000);

    /// `Bad_SubscriptionIdInvalid`.
    pub const BAD_SUBSCRIPTION_ID_INVALID: Self = Self(0x8028_0000);

    /// `Uncertain_LastUsableValue`.
    pub const UNCERTAIN_LAST_USABLE_VALUE: Self = Self(0x4090_0000);

    const SEVERITY_BAD: u32 = 0x8000_0000;
    const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

    /// Creates a status code from its raw value.
    #[inline]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if neither severity bit is set.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 & (Self::SEVERITY_BAD | Self::SEVERITY_UNCERTAIN) == 0
    }

    /// Returns `true` if the status is uncertain.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_UNCERTAIN != 0 && self.0 & Self::SEVERITY_BAD == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.0 & Self::SEVERITY_BAD != 0
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "Good")
        } else if self.is_bad() {
            write!(f, "Bad(0x{:08X})", self.0)
        } else if self.is_uncertain() {
            write!(f, "Uncertain(0x{:08X})", self.0)
        } else {
            write!(f, "Good(0x{:08X})", self.0)
        }
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// Variable value as delivered by the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),

    /// Signed byte.
    SByte(i8),

    /// Unsigned byte.
    Byte(u8),

    /// 16-bit signed integer.
    Int16(i16),

    /// 16-bit unsigned integer.
    UInt16(u16),

    /// 32-bit signed integer.
    Int32(i32),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 64-bit unsigned integer.
    UInt64(u64),

    /// 32-bit float.
    Float(f32),

    /// 64-bit double.
    Double(f64),

    /// String value.
    String(String),

    /// Date/time value.
    DateTime(DateTime<Utc>),

    /// Byte string.
    ByteString(Vec<u8>),

    /// Array of values.
    Array(Vec<OpcUaValue>),

    /// Null value.
    #[default]
    Null,
}

impl OpcUaValue {
    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::SByte(v) => Some(*v as f64),
            Self::Byte(v) => Some(*v as f64),
            Self::Int16(v) => Some(*v as f64),
            Self::UInt16(v) => Some(*v as f64),
            Self::Int32(v) => Some(*v as f64),
            Self::UInt32(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            Self::UInt64(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for OpcUaValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i32> for OpcUaValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<bool> for OpcUaValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for OpcUaValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// ValueSample
// =============================================================================

/// One observed value of a variable.
///
/// Samples are produced per poll tick or per publish event and handed to the
/// dispatcher; the observation layer keeps no copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSample {
    /// The observed value.
    pub value: OpcUaValue,

    /// Status reported with the value.
    pub status_code: StatusCode,

    /// When the value was produced at its source.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// When the server processed the value.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl ValueSample {
    /// Creates a sample with good status and no timestamps.
    pub fn new(value: impl Into<OpcUaValue>) -> Self {
        Self {
            value: value.into(),
            status_code: StatusCode::GOOD,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// Sets the status code.
    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(timestamp);
        self
    }

    /// Returns `true` if the sample's status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code.is_good()
    }
}

// =============================================================================
// Tests
// =============================================================================
