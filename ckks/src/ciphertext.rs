use crate::context::Fingerprint;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use math::poly::PolyRNS;
use math::serialization::{ReaderFrom, WriterTo};
use std::io::{Error, ErrorKind, Read, Result, Write};

/// Encoded message in the NTT domain over q_0, ..., q_level.
#[derive(Clone, Debug, PartialEq)]
pub struct Plaintext {
    pub(crate) value: PolyRNS<u64>,
    pub(crate) scale: f64,
}

impl Plaintext {
    pub fn level(&self) -> usize {
        self.value.level()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// (c0, c1) in the NTT domain with c0 + c1*s = m*scale + e.
#[derive(Clone, Debug, PartialEq)]
pub struct Ciphertext {
    pub(crate) c0: PolyRNS<u64>,
    pub(crate) c1: PolyRNS<u64>,
    pub(crate) scale: f64,
    pub(crate) fingerprint: Fingerprint,
}

impl Ciphertext {
    pub fn level(&self) -> usize {
        self.c0.level()
    }

    pub fn n(&self) -> usize {
        self.c0.n()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Fingerprint of the context that produced the ciphertext.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut ct: Ciphertext = Ciphertext::default();
        ct.read_from(reader)?;
        Ok(ct)
    }
}

impl Default for Ciphertext {
    fn default() -> Self {
        Self {
            c0: PolyRNS::default(),
            c1: PolyRNS::default(),
            scale: 1.0,
            fingerprint: Fingerprint::default(),
        }
    }
}

impl WriterTo for Ciphertext {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.fingerprint.0)?;
        writer.write_f64::<LittleEndian>(self.scale)?;
        self.c0.write_to(writer)?;
        self.c1.write_to(writer)
    }
}

impl ReaderFrom for Ciphertext {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        reader.read_exact(&mut self.fingerprint.0)?;
        self.scale = reader.read_f64::<LittleEndian>()?;
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid scale={}", self.scale),
            ));
        }
        self.c0.read_from(reader)?;
        self.c1.read_from(reader)?;
        if self.c0.level() != self.c1.level() || self.c0.n() != self.c1.n() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "ciphertext components differ in shape",
            ));
        }
        Ok(())
    }
}
