//! Sequence classifiers: an Elman RNN spelled out with linear layers and an
//! LSTM using candle's recurrent cell. Both read `(batch, seq, features)` and
//! classify from the last hidden state.

use candle_core::{Module, Tensor};
use candle_nn::rnn::{LSTMConfig, LSTM, RNN};
use candle_nn::{Linear, VarBuilder};

pub struct SimpleRnn {
    input: Linear,
    recurrent: Linear,
    head: Linear,
    hidden_dim: usize,
}

impl SimpleRnn {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        classes: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            input: candle_nn::linear(input_dim, hidden_dim, vb.pp("input"))?,
            recurrent: candle_nn::linear_no_bias(hidden_dim, hidden_dim, vb.pp("recurrent"))?,
            head: candle_nn::linear(hidden_dim, classes, vb.pp("head"))?,
            hidden_dim,
        })
    }

    /// Hidden state after the last step, `(batch, hidden)`.
    pub fn last_hidden(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        let mut h = Tensor::zeros((batch, self.hidden_dim), xs.dtype(), xs.device())?;
        for t in 0..seq_len {
            let x_t = xs.narrow(1, t, 1)?.squeeze(1)?;
            h = (self.input.forward(&x_t)? + self.recurrent.forward(&h)?)?.tanh()?;
        }
        Ok(h)
    }
}

impl Module for SimpleRnn {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.head.forward(&self.last_hidden(xs)?)
    }
}

pub struct LstmClassifier {
    lstm: LSTM,
    head: Linear,
}

impl LstmClassifier {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        classes: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            lstm: candle_nn::lstm(input_dim, hidden_dim, LSTMConfig::default(), vb.pp("lstm"))?,
            head: candle_nn::linear(hidden_dim, classes, vb.pp("head"))?,
        })
    }
}

impl Module for LstmClassifier {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let states = self.lstm.seq(xs)?;
        let last = match states.last() {
            Some(state) => state,
            None => candle_core::bail!("LSTM classifier needs at least one time step"),
        };
        self.head.forward(last.h())
    }
}
