//! Little-endian wire codec for the process boundary.
//!
//! Every message is framed as
//! `u32 msg_type ‖ u32 error ‖ u64 payload_len ‖ payload`; length and
//! payload are omitted when `error` is not OK. The payload packs
//! primitives (integers, doubles, length-prefixed strings, tagged
//! values) in request order. Handles cross the boundary as plain
//! `u64`s the caller treats as opaque.

use scan_core::{
    Constraint, DeviceDescriptor, DeviceLocations, ImageFormat, ItemType, OptionDescriptor,
    ScanError, ScanParameters, ScanResult, Unit, Value, ValueRange, ValueType,
};

use crate::message::{ItemHeader, OptionHeader, Request, Response};

#[derive(Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bool(&mut self, v: bool) {
        self.u32(u32::from(v));
    }

    fn string(&mut self, v: &str) {
        self.u64(v.len() as u64);
        self.buf.extend_from_slice(v.as_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.u64(v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    fn value(&mut self, v: &Value) {
        match v {
            Value::Bool(b) => {
                self.u32(0);
                self.bool(*b);
            }
            Value::Int(i) => {
                self.u32(1);
                self.i32(*i);
            }
            Value::Double(d) => {
                self.u32(2);
                self.f64(*d);
            }
            Value::Str(s) => {
                self.u32(3);
                self.string(s);
            }
            Value::ImageFormat(f) => {
                self.u32(4);
                self.u32(f.wire_code());
            }
        }
    }

    fn constraint(&mut self, c: &Constraint) {
        match c {
            Constraint::None => self.u32(0),
            Constraint::Range(range) => {
                self.u32(1);
                self.value(&range.min);
                self.value(&range.max);
                self.value(&range.interval);
            }
            Constraint::List(values) => {
                self.u32(2);
                self.u64(values.len() as u64);
                for value in values {
                    self.value(value);
                }
            }
        }
    }

    fn descriptor(&mut self, desc: &OptionDescriptor) {
        self.string(&desc.name);
        self.string(&desc.title);
        self.string(&desc.desc);
        self.u32(desc.capabilities.bits());
        self.u32(value_type_code(desc.value_type));
        self.u32(unit_code(desc.unit));
        self.constraint(&desc.constraint);
    }

    fn parameters(&mut self, p: &ScanParameters) {
        self.u32(p.format.wire_code());
        self.u32(p.width);
        self.u32(p.height);
        self.u64(p.image_size as u64);
    }

    fn item_header(&mut self, h: &ItemHeader) {
        self.u64(h.handle);
        self.string(&h.name);
        self.u32(h.item_type.wire_code());
    }
}

pub struct WireReader<'a> {
    buf: &'a [u8],
    off: usize,
}

fn truncated() -> ScanError {
    ScanError::Io("truncated message".to_string())
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    fn take(&mut self, nb: usize) -> ScanResult<&'a [u8]> {
        let end = self.off.checked_add(nb).ok_or_else(truncated)?;
        if end > self.buf.len() {
            return Err(truncated());
        }
        let out = &self.buf[self.off..end];
        self.off = end;
        Ok(out)
    }

    fn u32(&mut self) -> ScanResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> ScanResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> ScanResult<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> ScanResult<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bool(&mut self) -> ScanResult<bool> {
        Ok(self.u32()? != 0)
    }

    fn string(&mut self) -> ScanResult<String> {
        let len = self.u64()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| ScanError::Io("invalid string".to_string()))
    }

    fn bytes(&mut self) -> ScanResult<Vec<u8>> {
        let len = self.u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn value(&mut self) -> ScanResult<Value> {
        match self.u32()? {
            0 => Ok(Value::Bool(self.bool()?)),
            1 => Ok(Value::Int(self.i32()?)),
            2 => Ok(Value::Double(self.f64()?)),
            3 => Ok(Value::Str(self.string()?)),
            4 => {
                let code = self.u32()?;
                ImageFormat::from_wire_code(code)
                    .map(Value::ImageFormat)
                    .ok_or_else(|| ScanError::Io(format!("unknown image format code {code}")))
            }
            tag => Err(ScanError::Io(format!("unknown value tag {tag}"))),
        }
    }

    fn constraint(&mut self) -> ScanResult<Constraint> {
        match self.u32()? {
            0 => Ok(Constraint::None),
            1 => Ok(Constraint::Range(ValueRange {
                min: self.value()?,
                max: self.value()?,
                interval: self.value()?,
            })),
            2 => {
                let nb = self.u64()? as usize;
                let mut values = Vec::with_capacity(nb.min(1024));
                for _ in 0..nb {
                    values.push(self.value()?);
                }
                Ok(Constraint::List(values))
            }
            kind => Err(ScanError::Io(format!("unknown constraint kind {kind}"))),
        }
    }

    fn descriptor(&mut self) -> ScanResult<OptionDescriptor> {
        Ok(OptionDescriptor {
            name: self.string()?,
            title: self.string()?,
            desc: self.string()?,
            capabilities: scan_core::Capabilities::from_bits_truncate(self.u32()?),
            value_type: value_type_from_code(self.u32()?)?,
            unit: unit_from_code(self.u32()?)?,
            constraint: self.constraint()?,
        })
    }

    fn parameters(&mut self) -> ScanResult<ScanParameters> {
        let format_code = self.u32()?;
        Ok(ScanParameters {
            format: ImageFormat::from_wire_code(format_code)
                .ok_or_else(|| ScanError::Io(format!("unknown image format {format_code}")))?,
            width: self.u32()?,
            height: self.u32()?,
            image_size: self.u64()? as usize,
        })
    }

    fn item_header(&mut self) -> ScanResult<ItemHeader> {
        Ok(ItemHeader {
            handle: self.u64()?,
            name: self.string()?,
            item_type: ItemType::from_wire_code(self.u32()?),
        })
    }
}

fn value_type_code(t: ValueType) -> u32 {
    match t {
        ValueType::Bool => 0,
        ValueType::Int => 1,
        ValueType::Double => 2,
        ValueType::Str => 3,
        ValueType::ImageFormat => 4,
    }
}

fn value_type_from_code(code: u32) -> ScanResult<ValueType> {
    Ok(match code {
        0 => ValueType::Bool,
        1 => ValueType::Int,
        2 => ValueType::Double,
        3 => ValueType::Str,
        4 => ValueType::ImageFormat,
        _ => return Err(ScanError::Io(format!("unknown value type code {code}"))),
    })
}

fn unit_code(u: Unit) -> u32 {
    match u {
        Unit::None => 0,
        Unit::Pixel => 1,
        Unit::Bit => 2,
        Unit::Mm => 3,
        Unit::Dpi => 4,
        Unit::Percent => 5,
        Unit::Microsecond => 6,
    }
}

fn unit_from_code(code: u32) -> ScanResult<Unit> {
    Ok(match code {
        0 => Unit::None,
        1 => Unit::Pixel,
        2 => Unit::Bit,
        3 => Unit::Mm,
        4 => Unit::Dpi,
        5 => Unit::Percent,
        6 => Unit::Microsecond,
        _ => return Err(ScanError::Io(format!("unknown unit code {code}"))),
    })
}

fn locations_code(l: DeviceLocations) -> u32 {
    match l {
        DeviceLocations::Any => 0,
        DeviceLocations::LocalOnly => 1,
    }
}

fn locations_from_code(code: u32) -> DeviceLocations {
    if code == 1 {
        DeviceLocations::LocalOnly
    } else {
        DeviceLocations::Any
    }
}

/// Serialize a request payload (the frame header is written separately
/// by the pipe layer).
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut w = WireWriter::default();
    match request {
        Request::Cleanup => {}
        Request::ListDevices { locations } => w.u32(locations_code(*locations)),
        Request::GetDevice { dev_id } => w.string(dev_id),
        Request::ItemGetChildren { item }
        | Request::ItemGetOptions { item }
        | Request::ItemGetScanParameters { item }
        | Request::ItemScanStart { item }
        | Request::ItemClose { item } => w.u64(*item),
        Request::OptGet { option } => w.u64(*option),
        Request::OptSet { option, value } => {
            w.u64(*option);
            w.value(value);
        }
        Request::SessionGetScanParameters { session }
        | Request::SessionEndOfFeed { session }
        | Request::SessionEndOfPage { session }
        | Request::SessionCancel { session } => w.u64(*session),
        Request::SessionScanRead { session, max_len } => {
            w.u64(*session);
            w.u64(*max_len);
        }
    }
    w.into_bytes()
}

pub fn decode_request(msg_type: u32, payload: &[u8]) -> ScanResult<Request> {
    let mut r = WireReader::new(payload);
    Ok(match msg_type {
        0 => Request::Cleanup,
        1 => Request::ListDevices {
            locations: locations_from_code(r.u32()?),
        },
        2 => Request::GetDevice {
            dev_id: r.string()?,
        },
        3 => Request::ItemGetChildren { item: r.u64()? },
        4 => Request::ItemGetOptions { item: r.u64()? },
        5 => Request::ItemScanStart { item: r.u64()? },
        6 => Request::ItemClose { item: r.u64()? },
        7 => Request::OptGet { option: r.u64()? },
        8 => Request::OptSet {
            option: r.u64()?,
            value: r.value()?,
        },
        9 => Request::SessionGetScanParameters { session: r.u64()? },
        10 => Request::SessionEndOfFeed { session: r.u64()? },
        11 => Request::SessionEndOfPage { session: r.u64()? },
        12 => Request::SessionScanRead {
            session: r.u64()?,
            max_len: r.u64()?,
        },
        13 => Request::SessionCancel { session: r.u64()? },
        14 => Request::ItemGetScanParameters { item: r.u64()? },
        other => {
            return Err(ScanError::Io(format!("unknown message type {other}")));
        }
    })
}

pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut w = WireWriter::default();
    match response {
        Response::Done => w.u32(0),
        Response::Devices(devices) => {
            w.u32(1);
            w.u64(devices.len() as u64);
            for device in devices {
                w.string(&device.dev_id);
                w.string(&device.vendor);
                w.string(&device.model);
                w.string(&device.dev_type);
            }
        }
        Response::Item(header) => {
            w.u32(2);
            w.item_header(header);
        }
        Response::Items(headers) => {
            w.u32(3);
            w.u64(headers.len() as u64);
            for header in headers {
                w.item_header(header);
            }
        }
        Response::Options(options) => {
            w.u32(4);
            w.u64(options.len() as u64);
            for OptionHeader { handle, desc } in options {
                w.u64(*handle);
                w.descriptor(desc);
            }
        }
        Response::Parameters(parameters) => {
            w.u32(5);
            w.parameters(parameters);
        }
        Response::Flag(flag) => {
            w.u32(6);
            w.bool(*flag);
        }
        Response::Value(value) => {
            w.u32(7);
            w.value(value);
        }
        Response::SetFlags(bits) => {
            w.u32(8);
            w.u32(*bits);
        }
        Response::Data(data) => {
            w.u32(9);
            w.bytes(data);
        }
        Response::Session(handle) => {
            w.u32(10);
            w.u64(*handle);
        }
    }
    w.into_bytes()
}

pub fn decode_response(payload: &[u8]) -> ScanResult<Response> {
    let mut r = WireReader::new(payload);
    Ok(match r.u32()? {
        0 => Response::Done,
        1 => {
            let nb = r.u64()? as usize;
            let mut devices = Vec::with_capacity(nb.min(1024));
            for _ in 0..nb {
                devices.push(DeviceDescriptor {
                    dev_id: r.string()?,
                    vendor: r.string()?,
                    model: r.string()?,
                    dev_type: r.string()?,
                });
            }
            Response::Devices(devices)
        }
        2 => Response::Item(r.item_header()?),
        3 => {
            let nb = r.u64()? as usize;
            let mut headers = Vec::with_capacity(nb.min(1024));
            for _ in 0..nb {
                headers.push(r.item_header()?);
            }
            Response::Items(headers)
        }
        4 => {
            let nb = r.u64()? as usize;
            let mut options = Vec::with_capacity(nb.min(1024));
            for _ in 0..nb {
                options.push(OptionHeader {
                    handle: r.u64()?,
                    desc: r.descriptor()?,
                });
            }
            Response::Options(options)
        }
        5 => Response::Parameters(r.parameters()?),
        6 => Response::Flag(r.bool()?),
        7 => Response::Value(r.value()?),
        8 => Response::SetFlags(r.u32()?),
        9 => Response::Data(r.bytes()?),
        10 => Response::Session(r.u64()?),
        tag => {
            return Err(ScanError::Io(format!("unknown response tag {tag}")));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_core::Capabilities;

    fn round_trip_request(request: Request) {
        let payload = encode_request(&request);
        let decoded = decode_request(request.msg_type(), &payload).unwrap();
        assert_eq!(decoded, request);
    }

    fn round_trip_response(response: Response) {
        let payload = encode_response(&response);
        let decoded = decode_response(&payload).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn requests_round_trip() {
        round_trip_request(Request::Cleanup);
        round_trip_request(Request::ListDevices {
            locations: DeviceLocations::LocalOnly,
        });
        round_trip_request(Request::GetDevice {
            dev_id: "dumb dev0".to_string(),
        });
        round_trip_request(Request::ItemGetChildren { item: 7 });
        round_trip_request(Request::ItemGetOptions { item: 7 });
        round_trip_request(Request::ItemGetScanParameters { item: 7 });
        round_trip_request(Request::ItemScanStart { item: 7 });
        round_trip_request(Request::ItemClose { item: 7 });
        round_trip_request(Request::OptGet { option: 9 });
        round_trip_request(Request::OptSet {
            option: 9,
            value: Value::Str("Color".to_string()),
        });
        round_trip_request(Request::SessionGetScanParameters { session: 3 });
        round_trip_request(Request::SessionEndOfFeed { session: 3 });
        round_trip_request(Request::SessionEndOfPage { session: 3 });
        round_trip_request(Request::SessionScanRead {
            session: 3,
            max_len: 4096,
        });
        round_trip_request(Request::SessionCancel { session: 3 });
    }

    #[test]
    fn responses_round_trip() {
        round_trip_response(Response::Done);
        round_trip_response(Response::Devices(vec![DeviceDescriptor {
            dev_id: "dumb dev0".to_string(),
            vendor: "Dumb".to_string(),
            model: "Dev0".to_string(),
            dev_type: "fake".to_string(),
        }]));
        round_trip_response(Response::Item(ItemHeader {
            handle: 1,
            name: "dev".to_string(),
            item_type: ItemType::Device,
        }));
        round_trip_response(Response::Items(vec![ItemHeader {
            handle: 2,
            name: "flatbed".to_string(),
            item_type: ItemType::Flatbed,
        }]));
        round_trip_response(Response::Options(vec![OptionHeader {
            handle: 3,
            desc: OptionDescriptor {
                name: "resolution".to_string(),
                title: "Resolution".to_string(),
                desc: "scan resolution".to_string(),
                capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
                value_type: ValueType::Int,
                unit: Unit::Dpi,
                constraint: Constraint::List(vec![Value::Int(150), Value::Int(300)]),
            },
        }]));
        round_trip_response(Response::Parameters(ScanParameters {
            format: ImageFormat::RawRgb24,
            width: 100,
            height: 50,
            image_size: 15000,
        }));
        round_trip_response(Response::Flag(true));
        round_trip_response(Response::Value(Value::Double(300.5)));
        round_trip_response(Response::SetFlags(3));
        round_trip_response(Response::Data(vec![1, 2, 3, 4]));
        round_trip_response(Response::Session(12));
    }

    #[test]
    fn truncated_payloads_are_io_errors() {
        let payload = encode_response(&Response::Data(vec![1, 2, 3, 4]));
        assert!(matches!(
            decode_response(&payload[..payload.len() - 1]),
            Err(ScanError::Io(_))
        ));
    }

    #[test]
    fn range_constraints_round_trip() {
        let payload = encode_response(&Response::Options(vec![OptionHeader {
            handle: 1,
            desc: OptionDescriptor {
                name: "tl-x".to_string(),
                title: String::new(),
                desc: String::new(),
                capabilities: Capabilities::EMULATED,
                value_type: ValueType::Int,
                unit: Unit::Mm,
                constraint: Constraint::Range(ValueRange {
                    min: Value::Int(0),
                    max: Value::Int(210),
                    interval: Value::Int(1),
                }),
            },
        }]));
        let Response::Options(options) = decode_response(&payload).unwrap() else {
            panic!("wrong response variant");
        };
        assert_eq!(
            options[0].desc.constraint,
            Constraint::Range(ValueRange {
                min: Value::Int(0),
                max: Value::Int(210),
                interval: Value::Int(1),
            })
        );
    }
}
