use anyhow::{bail, Result};
use candle_core::{DType, Tensor};

/// Mean over unmasked token positions followed by L2 normalization.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]`; returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, time, hidden_dim) = match hidden.dims() {
        &[b, t, h] => (b, t, h),
        dims => bail!("hidden shape must be [B,T,H], got {:?}", dims),
    };
    if attention_mask.dims() != [batch, time] {
        bail!("attention mask shape {:?} does not match hidden [{batch},{time}]", attention_mask.dims());
    }

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    // An all-padding row pools to zeros instead of NaN.
    let counts = mask.sum_keepdim(1)?.maximum(1f64)?;
    let mean = summed.broadcast_div(&counts)?;

    let eps = if hidden.dtype() == DType::F16 { 1e-6 } else { 1e-12 };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    debug_assert_eq!(pooled.dims(), &[batch, hidden_dim]);
    Ok(pooled)
}
