use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use math::serialization::{ReaderFrom, WriterTo};
use std::io::{Error, ErrorKind, Read, Result, Write};

pub const MAGIC: &[u8; 4] = b"EMOT";

/// Largest rank and element count accepted when reading a tensor file.
pub const MAX_RANK: usize = 4;
pub const MAX_ELEMENTS: usize = 1 << 26;

/// Dense little-endian f64 tensor: magic, u32 rank, u64 dims, then data in
/// row-major order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tensor {
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn from_matrix(rows: &[Vec<f64>]) -> Self {
        let cols: usize = rows.first().map(|r| r.len()).unwrap_or(0);
        Self {
            dims: vec![rows.len(), cols],
            data: rows.iter().flat_map(|r| r.iter().copied()).collect(),
        }
    }

    pub fn from_vector(values: &[f64]) -> Self {
        Self {
            dims: vec![values.len()],
            data: values.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns None unless the tensor has rank 2.
    pub fn to_matrix(&self) -> Option<Vec<Vec<f64>>> {
        match self.dims.as_slice() {
            [_, 0] => Some(vec![Vec::new(); self.dims[0]]),
            [_, cols] => Some(self.data.chunks(*cols).map(|c| c.to_vec()).collect()),
            _ => None,
        }
    }

    /// Returns None unless the tensor has rank 1.
    pub fn to_vector(&self) -> Option<Vec<f64>> {
        match self.dims.as_slice() {
            [_] => Some(self.data.clone()),
            _ => None,
        }
    }
}

impl WriterTo for Tensor {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.dims.len() as u32)?;
        for d in self.dims.iter() {
            writer.write_u64::<LittleEndian>(*d as u64)?;
        }
        for x in self.data.iter() {
            writer.write_f64::<LittleEndian>(*x)?;
        }
        Ok(())
    }
}

impl ReaderFrom for Tensor {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut magic: [u8; 4] = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::new(ErrorKind::InvalidData, "not a tensor file"));
        }
        let rank: usize = reader.read_u32::<LittleEndian>()? as usize;
        if rank == 0 || rank > MAX_RANK {
            return Err(Error::new(ErrorKind::InvalidData, format!("invalid rank={}", rank)));
        }
        let mut dims: Vec<usize> = Vec::with_capacity(rank);
        let mut elements: usize = 1;
        for _ in 0..rank {
            let d: usize = reader.read_u64::<LittleEndian>()? as usize;
            elements = elements
                .checked_mul(d)
                .filter(|e| *e <= MAX_ELEMENTS)
                .ok_or_else(|| Error::new(ErrorKind::InvalidData, "tensor too large"))?;
            dims.push(d);
        }
        let mut data: Vec<f64> = vec![0f64; elements];
        reader.read_f64_into::<LittleEndian>(&mut data)?;
        self.dims = dims;
        self.data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_serialize() {
        let original: Tensor = Tensor::from_matrix(&[vec![1.0, 2.0, 3.0], vec![-4.0, 0.5, 6.0]]);
        let mut buffer: Vec<u8> = Vec::new();
        original.write_to(&mut buffer).unwrap();
        assert_eq!(&buffer[..4], MAGIC);
        assert_eq!(buffer.len(), 4 + 4 + 2 * 8 + 6 * 8);

        let mut receiver: Tensor = Tensor::default();
        let mut reader: &[u8] = &buffer;
        receiver.read_from(&mut reader).unwrap();
        assert_eq!(original, receiver, "Deserialized object does not match the original");
        assert_eq!(receiver.to_matrix().unwrap()[1], vec![-4.0, 0.5, 6.0]);
        assert!(receiver.to_vector().is_none());
    }

    #[test]
    fn malformed_tensors_are_rejected() {
        let mut receiver: Tensor = Tensor::default();

        let mut reader: &[u8] = b"NOPE\x01\x00\x00\x00";
        assert!(receiver.read_from(&mut reader).is_err());

        let mut huge: Vec<u8> = Vec::new();
        huge.extend_from_slice(MAGIC);
        huge.extend_from_slice(&2u32.to_le_bytes());
        huge.extend_from_slice(&u64::MAX.to_le_bytes());
        huge.extend_from_slice(&2u64.to_le_bytes());
        let mut reader: &[u8] = &huge;
        assert!(receiver.read_from(&mut reader).is_err());

        let mut truncated: Vec<u8> = Vec::new();
        Tensor::from_vector(&[1.0, 2.0]).write_to(&mut truncated).unwrap();
        truncated.pop();
        let mut reader: &[u8] = &truncated;
        assert!(receiver.read_from(&mut reader).is_err());
    }
}
