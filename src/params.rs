// params.rs
// Purpose: Seeded parameter initialisation and bookkeeping over a candle VarMap

use crate::errors::{RaftError, RaftResult};
use candle_core::{Tensor, Var};
use candle_nn::VarMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sorted_vars(varmap: &VarMap) -> RaftResult<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| RaftError::internal("varmap lock poisoned"))?;
    let mut vars: Vec<(String, Var)> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

/// Input fan of a weight: every dim after the first, so `(out, in)` linears
/// give `in` and `(out, in, kh, kw)` kernels give `in * kh * kw`. Vectors
/// fall back to their own length.
fn fan_in(dims: &[usize]) -> usize {
    match dims {
        [] => 1,
        [len] => *len,
        [_, rest @ ..] => rest.iter().product(),
    }
    .max(1)
}

/// Layer-norm affine terms, registered as `<...>.norm*.weight` / `.bias`.
fn layer_norm_fill(name: &str) -> Option<f32> {
    let mut segments = name.rsplit('.');
    let leaf = segments.next()?;
    let parent = segments.next()?;
    if !parent.starts_with("norm") {
        return None;
    }
    match leaf {
        "weight" => Some(1.0),
        "bias" => Some(0.0),
        _ => None,
    }
}

/// Overwrite every variable with uniform(-1/sqrt(fan_in), 1/sqrt(fan_in))
/// draws from a seeded generator. Variables are visited in name order so the
/// same seed always yields the same weights. Layer-norm scales stay at one
/// and their shifts at zero.
pub fn seed_parameters(varmap: &VarMap, seed: u64) -> RaftResult<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    for (name, var) in sorted_vars(varmap)? {
        let shape = var.as_tensor().shape().clone();
        let values: Vec<f32> = match layer_norm_fill(&name) {
            Some(fill) => vec![fill; shape.elem_count()],
            None => {
                let bound = 1.0 / (fan_in(shape.dims()) as f32).sqrt();
                (0..shape.elem_count())
                    .map(|_| rng.random_range(-bound..bound))
                    .collect()
            }
        };
        let init = Tensor::from_vec(values, shape, var.as_tensor().device())
            .and_then(|t| t.to_dtype(var.as_tensor().dtype()))
            .map_err(|e| RaftError::tensor(format!("initialising {name}"), e))?;
        var.set(&init)
            .map_err(|e| RaftError::tensor(format!("initialising {name}"), e))?;
    }
    Ok(())
}

/// Total number of scalar parameters.
pub fn parameter_count(varmap: &VarMap) -> RaftResult<usize> {
    Ok(sorted_vars(varmap)?
        .iter()
        .map(|(_, v)| v.as_tensor().elem_count())
        .sum())
}

/// Flattened copy of every variable, keyed by name, for equality checks.
pub fn snapshot(varmap: &VarMap) -> RaftResult<Vec<(String, Vec<f32>)>> {
    sorted_vars(varmap)?
        .into_iter()
        .map(|(name, var)| {
            let values = var
                .as_tensor()
                .flatten_all()
                .and_then(|t| t.to_dtype(candle_core::DType::F32))
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(|e| RaftError::tensor(format!("reading {name}"), e))?;
            Ok((name, values))
        })
        .collect()
}
