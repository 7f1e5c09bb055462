use crate::error::CodecError;
use crate::frame::MAX_PAYLOAD_BYTES;

/// Method identifier carried as the first byte of every REQUEST payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MethodId {
    FacilityCreate = 0x01,
    FacilityQuery = 0x02,
    FacilityMonitor = 0x03,
    FacilityDelete = 0x04,
    BookingMake = 0x11,
    BookingUpdate = 0x12,
    BookingDelete = 0x13,
}

impl MethodId {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Largest value the protocol's 24-bit big-endian fields can carry.
const U24_MAX: u32 = 0x00FF_FFFF;

/// One request payload per protocol method.
///
/// `encode` produces `[1: method id][method-specific fields]`, the opaque
/// request payload handed to the reliability engine. Time fields are whole
/// hours since the Unix epoch, as the server counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    FacilityCreate { name: &'a str },
    FacilityQuery { name: &'a str, days: u8 },
    FacilityMonitor { name: &'a str, ttl_seconds: u32 },
    FacilityDelete { name: &'a str },
    BookingMake { name: &'a str, start_hour: u32, end_hour: u32 },
    BookingUpdate { booking_id: u16, delta_hours: i32 },
    BookingDelete { booking_id: u16 },
}

impl Request<'_> {
    pub fn method(&self) -> MethodId {
        match self {
            Self::FacilityCreate { .. } => MethodId::FacilityCreate,
            Self::FacilityQuery { .. } => MethodId::FacilityQuery,
            Self::FacilityMonitor { .. } => MethodId::FacilityMonitor,
            Self::FacilityDelete { .. } => MethodId::FacilityDelete,
            Self::BookingMake { .. } => MethodId::BookingMake,
            Self::BookingUpdate { .. } => MethodId::BookingUpdate,
            Self::BookingDelete { .. } => MethodId::BookingDelete,
        }
    }

    /// Serializes the method id and fields into a request payload.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut payload = vec![self.method().code()];
        match *self {
            Self::FacilityCreate { name } | Self::FacilityDelete { name } => {
                payload.extend_from_slice(name.as_bytes());
            }
            Self::FacilityQuery { name, days } => {
                payload.push(days);
                payload.extend_from_slice(name.as_bytes());
            }
            Self::FacilityMonitor { name, ttl_seconds } => {
                put_u24(&mut payload, ttl_seconds, "monitor ttl exceeds 24 bits")?;
                payload.extend_from_slice(name.as_bytes());
            }
            Self::BookingMake {
                name,
                start_hour,
                end_hour,
            } => {
                put_u24(&mut payload, start_hour, "start hour exceeds 24 bits")?;
                put_u24(&mut payload, end_hour, "end hour exceeds 24 bits")?;
                payload.extend_from_slice(name.as_bytes());
            }
            Self::BookingUpdate {
                booking_id,
                delta_hours,
            } => {
                payload.extend_from_slice(&booking_id.to_be_bytes());
                // Sign travels as flag bit 0; magnitude as a 24-bit field.
                payload.push(u8::from(delta_hours < 0));
                put_u24(
                    &mut payload,
                    delta_hours.unsigned_abs(),
                    "delta hours exceed 24 bits",
                )?;
            }
            Self::BookingDelete { booking_id } => {
                payload.extend_from_slice(&booking_id.to_be_bytes());
            }
        }
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(CodecError::PayloadTooLarge(payload.len()));
        }
        Ok(payload)
    }
}

/// Appends a 24-bit big-endian field.
fn put_u24(out: &mut Vec<u8>, value: u32, context: &'static str) -> Result<(), CodecError> {
    if value > U24_MAX {
        return Err(CodecError::InvalidRequest(context));
    }
    out.extend_from_slice(&value.to_be_bytes()[1..]);
    Ok(())
}
