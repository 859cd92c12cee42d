//! Cascaded integrator-comb (CIC) decimator.
//!
//! Integer-only, fixed-point decimation by factor `R` using `N` integrator
//! stages run at the input rate followed by `N` comb (differencer) stages
//! run at the output rate. Overflow of the 64-bit integrator accumulators
//! is tolerated: comb subtraction recovers the correct value as long as it
//! happens within the same modulus, which is the standard CIC invariant.

/// Default number of integrator/comb stages.
pub const DEFAULT_STAGES: usize = 3;

/// One CIC decimator instance, tracking independent I and Q state.
pub struct CicDecimator {
    rate: u32,
    stages: usize,
    ctr: u32,
    int_i: Vec<i64>,
    int_q: Vec<i64>,
    comb_i: Vec<i64>,
    comb_q: Vec<i64>,
    gain: i64,
}

impl CicDecimator {
    /// `rate` is the decimation factor `R`; `stages` is `N`.
    pub fn new(rate: u32, stages: usize) -> Self {
        assert!(rate >= 2, "CIC decimation factor must be at least 2");
        assert!(stages >= 1, "CIC needs at least one integrator/comb stage");
        let gain = (rate as i64).pow(stages as u32).max(1);
        Self {
            rate,
            stages,
            ctr: 0,
            int_i: vec![0; stages],
            int_q: vec![0; stages],
            comb_i: vec![0; stages],
            comb_q: vec![0; stages],
            gain,
        }
    }

    /// Feeds one input IQ pair. Returns `Some((i, q))`, each clamped to
    /// `i8` range, once every `rate` input samples; `None` otherwise.
    pub fn process_one(&mut self, xi: i32, xq: i32) -> Option<(i8, i8)> {
        let mut yi = xi as i64;
        let mut yq = xq as i64;
        for s in 0..self.stages {
            self.int_i[s] = self.int_i[s].wrapping_add(yi);
            self.int_q[s] = self.int_q[s].wrapping_add(yq);
            yi = self.int_i[s];
            yq = self.int_q[s];
        }

        self.ctr += 1;
        if self.ctr < self.rate {
            return None;
        }
        self.ctr = 0;

        for s in 0..self.stages {
            let prev_i = self.comb_i[s];
            let prev_q = self.comb_q[s];
            self.comb_i[s] = yi;
            self.comb_q[s] = yq;
            yi = yi.wrapping_sub(prev_i);
            yq = yq.wrapping_sub(prev_q);
        }

        yi /= self.gain;
        yq /= self.gain;

        Some((clamp_i8(yi), clamp_i8(yq)))
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }
}

fn clamp_i8(v: i64) -> i8 {
    v.clamp(-128, 127) as i8
}
