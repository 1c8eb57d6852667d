pub mod ntt;

/// Forward and backward negacyclic transforms over a slice of residues.
pub trait DFT<O>: Send + Sync {
    fn forward_inplace(&self, a: &mut [O]);
    fn backward_inplace(&self, a: &mut [O]);
}
