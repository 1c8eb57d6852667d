use crate::poly::{Poly, PolyRNS};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind, Read, Result, Write};

/// Largest ring degree accepted when reading untrusted input.
pub const MAX_DEGREE: usize = 1 << 17;
/// Largest number of RNS limbs accepted when reading untrusted input.
pub const MAX_LIMBS: usize = 64;

pub trait WriterTo {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()>;
}

pub trait ReaderFrom {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()>;
}

impl WriterTo for Poly<u64> {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<LittleEndian>(self.n() as u64)?;
        for x in self.0.iter() {
            writer.write_u64::<LittleEndian>(*x)?;
        }
        Ok(())
    }
}

impl ReaderFrom for Poly<u64> {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let n: usize = reader.read_u64::<LittleEndian>()? as usize;
        if n == 0 || n > MAX_DEGREE || !n.is_power_of_two() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid polynomial degree n={}", n),
            ));
        }
        self.0.resize(n, 0);
        reader.read_u64_into::<LittleEndian>(&mut self.0)?;
        Ok(())
    }
}

impl WriterTo for PolyRNS<u64> {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<LittleEndian>(self.0.len() as u64)?;
        for poly in self.0.iter() {
            poly.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for PolyRNS<u64> {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let limbs: usize = reader.read_u64::<LittleEndian>()? as usize;
        if limbs == 0 || limbs > MAX_LIMBS {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid number of limbs={}", limbs),
            ));
        }
        self.0.clear();
        for _ in 0..limbs {
            let mut poly: Poly<u64> = Poly(Vec::new());
            poly.read_from(reader)?;
            if let Some(first) = self.0.first() {
                if first.n() != poly.n() {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("limb degree mismatch: {} != {}", poly.n(), first.n()),
                    ));
                }
            }
            self.0.push(poly);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polyrns_serialize() {
        let mut original: PolyRNS<u64> = PolyRNS::new(16, 2);
        original
            .0
            .iter_mut()
            .enumerate()
            .for_each(|(i, p)| p.0.iter_mut().enumerate().for_each(|(j, x)| *x = (i * 100 + j) as u64));

        let mut buffer: Vec<u8> = Vec::new();
        original.write_to(&mut buffer).expect("write_to failed");

        let mut receiver: PolyRNS<u64> = PolyRNS::default();
        let mut reader: &[u8] = &buffer;
        receiver.read_from(&mut reader).expect("read_from failed");

        assert_eq!(original, receiver, "Deserialized object does not match the original");
    }

    #[test]
    fn truncated_input_is_rejected() {
        let original: PolyRNS<u64> = PolyRNS::new(16, 1);
        let mut buffer: Vec<u8> = Vec::new();
        original.write_to(&mut buffer).unwrap();
        buffer.truncate(buffer.len() - 3);
        let mut receiver: PolyRNS<u64> = PolyRNS::default();
        let mut reader: &[u8] = &buffer;
        assert!(receiver.read_from(&mut reader).is_err());
    }
}
