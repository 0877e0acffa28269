//! NetCDF classic test data generator.
//!
//! Writes CDF-1, CDF-2 or CDF-5 files with fixed and record variables,
//! following the classic format layout (big-endian, 4-byte padding).

/// Storage type of a generated variable or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcKind {
    Short,
    Int,
    Float,
    Double,
}

impl NcKind {
    fn code(&self) -> u32 {
        match self {
            NcKind::Short => 3,
            NcKind::Int => 4,
            NcKind::Float => 5,
            NcKind::Double => 6,
        }
    }

    fn size(&self) -> usize {
        match self {
            NcKind::Short => 2,
            NcKind::Int | NcKind::Float => 4,
            NcKind::Double => 8,
        }
    }

    fn encode(&self, v: f64, out: &mut Vec<u8>) {
        match self {
            NcKind::Short => out.extend_from_slice(&(v.round() as i16).to_be_bytes()),
            NcKind::Int => out.extend_from_slice(&(v.round() as i32).to_be_bytes()),
            NcKind::Float => out.extend_from_slice(&(v as f32).to_be_bytes()),
            NcKind::Double => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum NcAttr {
    Text(String),
    Number(NcKind, f64),
}

impl NcAttr {
    pub fn text(s: &str) -> Self {
        NcAttr::Text(s.to_string())
    }
}

#[derive(Debug, Clone)]
struct NcVar {
    name: String,
    dims: Vec<usize>,
    kind: NcKind,
    attrs: Vec<(String, NcAttr)>,
    data: Vec<f64>,
}

/// Builder for NetCDF classic payloads.
#[derive(Debug, Clone)]
pub struct NetCdfBuilder {
    version: u8,
    dims: Vec<(String, usize)>,
    record_dim: Option<usize>,
    numrecs: usize,
    global_attrs: Vec<(String, NcAttr)>,
    vars: Vec<NcVar>,
}

impl Default for NetCdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetCdfBuilder {
    /// CDF-1 (classic) file.
    pub fn new() -> Self {
        Self {
            version: 1,
            dims: Vec::new(),
            record_dim: None,
            numrecs: 0,
            global_attrs: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// CDF-2 (64-bit offset) file.
    pub fn offset64() -> Self {
        Self {
            version: 2,
            ..Self::new()
        }
    }

    /// CDF-5 (64-bit data) file.
    pub fn data64() -> Self {
        Self {
            version: 5,
            ..Self::new()
        }
    }

    pub fn dimension(mut self, name: &str, len: usize) -> Self {
        self.dims.push((name.to_string(), len));
        self
    }

    /// The unlimited dimension with `numrecs` records written.
    pub fn record_dimension(mut self, name: &str, numrecs: usize) -> Self {
        self.record_dim = Some(self.dims.len());
        self.numrecs = numrecs;
        self.dims.push((name.to_string(), 0));
        self
    }

    pub fn global_attribute(mut self, name: &str, value: NcAttr) -> Self {
        self.global_attrs.push((name.to_string(), value));
        self
    }

    /// Add a variable over named dimensions; `data` is row-major.
    ///
    /// Panics if a dimension name is unknown (test helper).
    pub fn variable(mut self, name: &str, dims: &[&str], kind: NcKind, data: Vec<f64>) -> Self {
        let dims = dims
            .iter()
            .map(|d| {
                self.dims
                    .iter()
                    .position(|(n, _)| n == d)
                    .unwrap_or_else(|| panic!("unknown dimension {}", d))
            })
            .collect();
        self.vars.push(NcVar {
            name: name.to_string(),
            dims,
            kind,
            attrs: Vec::new(),
            data,
        });
        self
    }

    /// Attach an attribute to the most recently added variable.
    pub fn attribute(mut self, name: &str, value: NcAttr) -> Self {
        if let Some(var) = self.vars.last_mut() {
            var.attrs.push((name.to_string(), value));
        }
        self
    }

    /// A 1-D coordinate variable named after its dimension.
    pub fn coordinate(self, name: &str, values: Vec<f64>, units: &str) -> Self {
        let len = values.len();
        self.dimension(name, len)
            .variable(name, &[name], NcKind::Double, values)
            .attribute("units", NcAttr::text(units))
    }

    fn is_record(&self, var: &NcVar) -> bool {
        var.dims.first().copied() == self.record_dim && self.record_dim.is_some()
    }

    fn slab_values(&self, var: &NcVar) -> usize {
        let dims = if self.is_record(var) {
            &var.dims[1..]
        } else {
            &var.dims[..]
        };
        dims.iter().map(|&d| self.dims[d].1).product()
    }

    pub fn build(&self) -> Vec<u8> {
        // First pass with placeholder offsets to learn the header size.
        let header_len = self.header(&vec![0; self.vars.len()]).len();

        let record_vars: Vec<usize> = (0..self.vars.len())
            .filter(|&i| self.is_record(&self.vars[i]))
            .collect();
        let single_record_var = record_vars.len() == 1;

        let mut begins = vec![0u64; self.vars.len()];
        let mut offset = header_len;
        for (i, var) in self.vars.iter().enumerate() {
            if !self.is_record(var) {
                begins[i] = offset as u64;
                offset += pad4(self.slab_values(var) * var.kind.size());
            }
        }
        for &i in &record_vars {
            begins[i] = offset as u64;
            let var = &self.vars[i];
            let bytes = self.slab_values(var) * var.kind.size();
            offset += if single_record_var { bytes } else { pad4(bytes) };
        }

        let mut out = self.header(&begins);

        for var in self.vars.iter().filter(|v| !self.is_record(v)) {
            let n = self.slab_values(var);
            for k in 0..n {
                var.kind.encode(var.data.get(k).copied().unwrap_or(0.0), &mut out);
            }
            pad(&mut out);
        }

        for rec in 0..self.numrecs {
            for &i in &record_vars {
                let var = &self.vars[i];
                let n = self.slab_values(var);
                for k in 0..n {
                    let v = var.data.get(rec * n + k).copied().unwrap_or(0.0);
                    var.kind.encode(v, &mut out);
                }
                if !single_record_var {
                    pad(&mut out);
                }
            }
        }

        out
    }

    fn header(&self, begins: &[u64]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"CDF");
        out.push(self.version);
        self.put_size(&mut out, self.numrecs);

        // dim_list
        if self.dims.is_empty() {
            self.put_absent(&mut out);
        } else {
            out.extend_from_slice(&0x0Au32.to_be_bytes());
            self.put_size(&mut out, self.dims.len());
            for (name, len) in &self.dims {
                self.put_name(&mut out, name);
                self.put_size(&mut out, *len);
            }
        }

        self.put_attrs(&mut out, &self.global_attrs);

        // var_list
        if self.vars.is_empty() {
            self.put_absent(&mut out);
        } else {
            out.extend_from_slice(&0x0Bu32.to_be_bytes());
            self.put_size(&mut out, self.vars.len());
            for (var, begin) in self.vars.iter().zip(begins) {
                self.put_name(&mut out, &var.name);
                self.put_size(&mut out, var.dims.len());
                for &d in &var.dims {
                    self.put_size(&mut out, d);
                }
                self.put_attrs(&mut out, &var.attrs);
                out.extend_from_slice(&var.kind.code().to_be_bytes());
                self.put_size(&mut out, pad4(self.slab_values(var) * var.kind.size()));
                if self.version == 1 {
                    out.extend_from_slice(&(*begin as u32).to_be_bytes());
                } else {
                    out.extend_from_slice(&begin.to_be_bytes());
                }
            }
        }
        out
    }

    fn put_size(&self, out: &mut Vec<u8>, n: usize) {
        if self.version == 5 {
            out.extend_from_slice(&(n as u64).to_be_bytes());
        } else {
            out.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }

    fn put_absent(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&0u32.to_be_bytes());
        self.put_size(out, 0);
    }

    fn put_name(&self, out: &mut Vec<u8>, name: &str) {
        self.put_size(out, name.len());
        out.extend_from_slice(name.as_bytes());
        pad(out);
    }

    fn put_attrs(&self, out: &mut Vec<u8>, attrs: &[(String, NcAttr)]) {
        if attrs.is_empty() {
            self.put_absent(out);
            return;
        }
        out.extend_from_slice(&0x0Cu32.to_be_bytes());
        self.put_size(out, attrs.len());
        for (name, value) in attrs {
            self.put_name(out, name);
            match value {
                NcAttr::Text(s) => {
                    out.extend_from_slice(&2u32.to_be_bytes());
                    self.put_size(out, s.len());
                    out.extend_from_slice(s.as_bytes());
                }
                NcAttr::Number(kind, v) => {
                    out.extend_from_slice(&kind.code().to_be_bytes());
                    self.put_size(out, 1);
                    kind.encode(*v, out);
                }
            }
            pad(out);
        }
    }
}

fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

fn pad(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}
