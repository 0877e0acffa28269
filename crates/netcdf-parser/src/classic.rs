//! NetCDF classic format reader (CDF-1, CDF-2 64-bit offset, CDF-5 64-bit data).
//!
//! The whole file is held in memory; the header is parsed eagerly and
//! variable data is decoded on demand.

use crate::error::{NetCdfError, NetCdfResult};

const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;
const STREAMING: u64 = 0xFFFF_FFFF;

/// External data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
}

impl NcType {
    fn from_code(code: u32) -> NetCdfResult<Self> {
        Ok(match code {
            1 => NcType::Byte,
            2 => NcType::Char,
            3 => NcType::Short,
            4 => NcType::Int,
            5 => NcType::Float,
            6 => NcType::Double,
            7 => NcType::UByte,
            8 => NcType::UShort,
            9 => NcType::UInt,
            10 => NcType::Int64,
            11 => NcType::UInt64,
            other => {
                return Err(NetCdfError::InvalidFormat(format!(
                    "unknown nc_type {}",
                    other
                )))
            }
        })
    }

    pub fn size(&self) -> usize {
        match self {
            NcType::Byte | NcType::Char | NcType::UByte => 1,
            NcType::Short | NcType::UShort => 2,
            NcType::Int | NcType::UInt | NcType::Float => 4,
            NcType::Double | NcType::Int64 | NcType::UInt64 => 8,
        }
    }

    /// Decode one big-endian value. `bytes` must hold exactly `size()` bytes.
    fn decode(&self, b: &[u8]) -> f64 {
        match self {
            NcType::Byte => b[0] as i8 as f64,
            NcType::Char | NcType::UByte => b[0] as f64,
            NcType::Short => i16::from_be_bytes([b[0], b[1]]) as f64,
            NcType::UShort => u16::from_be_bytes([b[0], b[1]]) as f64,
            NcType::Int => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
            NcType::UInt => u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
            NcType::Float => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
            NcType::Double => {
                f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            NcType::Int64 => {
                i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64
            }
            NcType::UInt64 => {
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Numbers(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Numbers(v) => v.first().copied(),
            AttrValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    /// 0 for the record (unlimited) dimension
    pub len: usize,
}

impl Dimension {
    pub fn is_record(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone)]
pub struct VariableHeader {
    pub name: String,
    pub dim_ids: Vec<usize>,
    pub attributes: Vec<Attribute>,
    pub nc_type: NcType,
    pub begin: u64,
}

impl VariableHeader {
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

/// A parsed classic-format file.
#[derive(Debug)]
pub struct ClassicFile<'a> {
    data: &'a [u8],
    pub version: u8,
    pub numrecs: usize,
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
    pub variables: Vec<VariableHeader>,
}

impl<'a> ClassicFile<'a> {
    pub fn parse(data: &'a [u8]) -> NetCdfResult<Self> {
        if data.len() < 4 || &data[0..3] != b"CDF" {
            return Err(NetCdfError::InvalidFormat(
                "missing CDF magic".to_string(),
            ));
        }
        let version = data[3];
        if !matches!(version, 1 | 2 | 5) {
            return Err(NetCdfError::Unsupported(format!(
                "classic format version {}",
                version
            )));
        }

        let mut cursor = Cursor::new(data, version);
        cursor.skip(4)?;

        let numrecs = cursor.size()?;
        let dimensions = cursor.dimensions()?;
        let attributes = cursor.attributes()?;
        let variables = cursor.variables(dimensions.len())?;

        let mut file = Self {
            data,
            version,
            numrecs: 0,
            dimensions,
            attributes,
            variables,
        };
        file.numrecs = if numrecs == STREAMING {
            file.streaming_numrecs()
        } else {
            numrecs as usize
        };
        Ok(file)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableHeader> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Dimension names and lengths of a variable (record dimension resolved).
    pub fn shape(&self, var: &VariableHeader) -> (Vec<String>, Vec<usize>) {
        var.dim_ids
            .iter()
            .filter_map(|&id| self.dimensions.get(id))
            .map(|d| {
                let len = if d.is_record() { self.numrecs } else { d.len };
                (d.name.clone(), len)
            })
            .unzip()
    }

    pub fn is_record_variable(&self, var: &VariableHeader) -> bool {
        var.dim_ids
            .first()
            .and_then(|&id| self.dimensions.get(id))
            .map_or(false, |d| d.is_record())
    }

    /// Decode all values of a variable as raw (unscaled) `f64`.
    ///
    /// The extent claimed by the header is checked against the payload
    /// before anything is allocated.
    pub fn read_raw(&self, var: &VariableHeader) -> NetCdfResult<Vec<f64>> {
        let size = var.nc_type.size();
        let begin = usize::try_from(var.begin).map_err(|_| overflow(&var.name))?;

        if !self.is_record_variable(var) {
            let (_, shape) = self.shape(var);
            let count = shape
                .iter()
                .try_fold(1usize, |acc, &n| acc.checked_mul(n))
                .ok_or_else(|| overflow(&var.name))?;
            return self.decode_run(var.nc_type, begin, count, &var.name);
        }

        let per_record = self.record_slab_len(var).ok_or_else(|| overflow(&var.name))?;
        if self.numrecs == 0 || per_record == 0 {
            return Ok(Vec::new());
        }
        let record_size = self.record_size().ok_or_else(|| overflow(&var.name))?;
        let end = (self.numrecs - 1)
            .checked_mul(record_size)
            .and_then(|last| last.checked_add(begin))
            .and_then(|last| per_record.checked_mul(size).and_then(|n| last.checked_add(n)))
            .ok_or_else(|| overflow(&var.name))?;
        if end > self.data.len() {
            return Err(past_end(&var.name, end, self.data.len()));
        }

        let mut values = Vec::with_capacity(per_record * self.numrecs);
        for rec in 0..self.numrecs {
            let start = begin + rec * record_size;
            values.extend(self.decode_run(var.nc_type, start, per_record, &var.name)?);
        }
        Ok(values)
    }

    fn decode_run(
        &self,
        nc_type: NcType,
        start: usize,
        count: usize,
        name: &str,
    ) -> NetCdfResult<Vec<f64>> {
        let size = nc_type.size();
        let end = count
            .checked_mul(size)
            .and_then(|n| n.checked_add(start))
            .ok_or_else(|| overflow(name))?;
        let bytes = self
            .data
            .get(start..end)
            .ok_or_else(|| past_end(name, end, self.data.len()))?;
        Ok(bytes.chunks_exact(size).map(|b| nc_type.decode(b)).collect())
    }

    /// Values per record for a record variable; `None` on overflow.
    fn record_slab_len(&self, var: &VariableHeader) -> Option<usize> {
        var.dim_ids
            .iter()
            .skip(1)
            .filter_map(|&id| self.dimensions.get(id))
            .try_fold(1usize, |acc, d| acc.checked_mul(d.len))
    }

    /// Bytes per record across all record variables; `None` on overflow.
    fn record_size(&self) -> Option<usize> {
        let record_vars: Vec<&VariableHeader> = self
            .variables
            .iter()
            .filter(|v| self.is_record_variable(v))
            .collect();

        // A lone record variable is not padded.
        if let [only] = record_vars.as_slice() {
            return self.record_slab_len(only)?.checked_mul(only.nc_type.size());
        }

        record_vars.iter().try_fold(0usize, |acc, v| {
            let bytes = self.record_slab_len(v)?.checked_mul(v.nc_type.size())?;
            acc.checked_add(bytes.checked_add(3)? & !3)
        })
    }

    fn streaming_numrecs(&self) -> usize {
        let first = self
            .variables
            .iter()
            .filter(|v| self.is_record_variable(v))
            .map(|v| v.begin as usize)
            .min();
        match (first, self.record_size()) {
            (Some(begin), Some(record_size)) if record_size > 0 && self.data.len() > begin => {
                (self.data.len() - begin) / record_size
            }
            _ => 0,
        }
    }
}

fn overflow(name: &str) -> NetCdfError {
    NetCdfError::InvalidFormat(format!("size of '{}' overflows", name))
}

fn past_end(name: &str, end: usize, len: usize) -> NetCdfError {
    NetCdfError::InvalidFormat(format!(
        "data of '{}' runs past end of file ({} > {})",
        name, end, len
    ))
}

fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    version: u8,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], version: u8) -> Self {
        Self {
            data,
            pos: 0,
            version,
        }
    }

    fn take(&mut self, n: usize) -> NetCdfResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(NetCdfError::InvalidFormat(format!(
                "header truncated at byte {}",
                self.pos
            )));
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> NetCdfResult<()> {
        self.take(n).map(|_| ())
    }

    fn u32(&mut self) -> NetCdfResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> NetCdfResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Counts and lengths: 8 bytes in CDF-5, 4 bytes otherwise.
    fn size(&mut self) -> NetCdfResult<u64> {
        if self.version == 5 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    /// Variable data offsets: 4 bytes in CDF-1 only.
    fn offset(&mut self) -> NetCdfResult<u64> {
        if self.version == 1 {
            self.u32().map(u64::from)
        } else {
            self.u64()
        }
    }

    fn name(&mut self) -> NetCdfResult<String> {
        let len = self.size()? as usize;
        let bytes = self.take(len)?;
        self.skip(pad4(len) - len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| NetCdfError::InvalidFormat("name is not UTF-8".to_string()))
    }

    /// Read a list tag; `None` for ABSENT.
    fn list(&mut self, expected: u32) -> NetCdfResult<Option<usize>> {
        let tag = self.u32()?;
        let count = self.size()? as usize;
        match tag {
            0 if count == 0 => Ok(None),
            t if t == expected => Ok(Some(count)),
            other => Err(NetCdfError::InvalidFormat(format!(
                "expected list tag {:#x}, found {:#x}",
                expected, other
            ))),
        }
    }

    fn dimensions(&mut self) -> NetCdfResult<Vec<Dimension>> {
        let Some(count) = self.list(NC_DIMENSION)? else {
            return Ok(Vec::new());
        };
        (0..count)
            .map(|_| {
                Ok(Dimension {
                    name: self.name()?,
                    len: self.size()? as usize,
                })
            })
            .collect()
    }

    fn attributes(&mut self) -> NetCdfResult<Vec<Attribute>> {
        let Some(count) = self.list(NC_ATTRIBUTE)? else {
            return Ok(Vec::new());
        };
        (0..count).map(|_| self.attribute()).collect()
    }

    fn attribute(&mut self) -> NetCdfResult<Attribute> {
        let name = self.name()?;
        let nc_type = NcType::from_code(self.u32()?)?;
        let nelems = self.size()? as usize;
        let len = nelems.checked_mul(nc_type.size()).ok_or_else(|| {
            NetCdfError::InvalidFormat(format!("attribute '{}' is too large", name))
        })?;
        let bytes = self.take(len)?;
        self.skip(pad4(len) - len)?;

        let value = if nc_type == NcType::Char {
            let text = String::from_utf8_lossy(bytes);
            AttrValue::Text(text.trim_end_matches('\0').to_string())
        } else {
            AttrValue::Numbers(
                bytes
                    .chunks_exact(nc_type.size())
                    .map(|b| nc_type.decode(b))
                    .collect(),
            )
        };
        Ok(Attribute { name, value })
    }

    fn variables(&mut self, num_dims: usize) -> NetCdfResult<Vec<VariableHeader>> {
        let Some(count) = self.list(NC_VARIABLE)? else {
            return Ok(Vec::new());
        };
        (0..count)
            .map(|_| {
                let name = self.name()?;
                let ndims = self.size()? as usize;
                let dim_ids = (0..ndims)
                    .map(|_| {
                        let id = self.size()? as usize;
                        if id >= num_dims {
                            return Err(NetCdfError::InvalidFormat(format!(
                                "variable '{}' references dimension {}",
                                name, id
                            )));
                        }
                        Ok(id)
                    })
                    .collect::<NetCdfResult<Vec<_>>>()?;
                let attributes = self.attributes()?;
                let nc_type = NcType::from_code(self.u32()?)?;
                let _vsize = self.size()?;
                let begin = self.offset()?;
                Ok(VariableHeader {
                    name,
                    dim_ids,
                    attributes,
                    nc_type,
                    begin,
                })
            })
            .collect()
    }
}
