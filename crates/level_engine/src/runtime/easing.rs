use std::f32::consts::{FRAC_PI_2, PI};

const DEFAULT_ELASTIC_PERIOD: f32 = 0.3;
const BACK_OVERSHOOT: f32 = 1.70158;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    EaseInOut { rate: f32 },
    EaseIn { rate: f32 },
    EaseOut { rate: f32 },
    ElasticInOut { period: f32 },
    ElasticIn { period: f32 },
    ElasticOut { period: f32 },
    BounceInOut,
    BounceIn,
    BounceOut,
    ExponentialInOut,
    ExponentialIn,
    ExponentialOut,
    SineInOut,
    SineIn,
    SineOut,
    BackInOut,
    BackIn,
    BackOut,
}

impl Easing {
    /// Decodes a move-trigger easing id with its rate. Unknown ids are linear.
    pub fn from_id(id: u32, rate: f32) -> Self {
        match id {
            1 => Self::EaseInOut { rate },
            2 => Self::EaseIn { rate },
            3 => Self::EaseOut { rate },
            4 => Self::ElasticInOut { period: rate },
            5 => Self::ElasticIn { period: rate },
            6 => Self::ElasticOut { period: rate },
            7 => Self::BounceInOut,
            8 => Self::BounceIn,
            9 => Self::BounceOut,
            10 => Self::ExponentialInOut,
            11 => Self::ExponentialIn,
            12 => Self::ExponentialOut,
            13 => Self::SineInOut,
            14 => Self::SineIn,
            15 => Self::SineOut,
            16 => Self::BackInOut,
            17 => Self::BackIn,
            18 => Self::BackOut,
            _ => Self::Linear,
        }
    }

    /// Eased progress for `t` in `[0, 1]`. The endpoints map to exactly 0 and 1.
    pub fn apply(self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        match self {
            Self::Linear => t,
            Self::EaseIn { rate } => t.powf(sanitize_rate(rate)),
            Self::EaseOut { rate } => t.powf(1.0 / sanitize_rate(rate)),
            Self::EaseInOut { rate } => {
                let rate = sanitize_rate(rate);
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * t.powf(rate)
                } else {
                    1.0 - 0.5 * (2.0 - t).powf(rate)
                }
            }
            Self::ElasticIn { period } => {
                let period = sanitize_period(period, DEFAULT_ELASTIC_PERIOD);
                let shift = period / 4.0;
                let t = t - 1.0;
                -(2.0f32.powf(10.0 * t)) * ((t - shift) * 2.0 * PI / period).sin()
            }
            Self::ElasticOut { period } => {
                let period = sanitize_period(period, DEFAULT_ELASTIC_PERIOD);
                let shift = period / 4.0;
                2.0f32.powf(-10.0 * t) * ((t - shift) * 2.0 * PI / period).sin() + 1.0
            }
            Self::ElasticInOut { period } => {
                let period = sanitize_period(period, DEFAULT_ELASTIC_PERIOD * 1.5);
                let shift = period / 4.0;
                let t = t * 2.0 - 1.0;
                let wave = ((t - shift) * 2.0 * PI / period).sin();
                if t < 0.0 {
                    -0.5 * 2.0f32.powf(10.0 * t) * wave
                } else {
                    2.0f32.powf(-10.0 * t) * wave * 0.5 + 1.0
                }
            }
            Self::BounceOut => bounce_time(t),
            Self::BounceIn => 1.0 - bounce_time(1.0 - t),
            Self::BounceInOut => {
                if t < 0.5 {
                    (1.0 - bounce_time(1.0 - t * 2.0)) * 0.5
                } else {
                    bounce_time(t * 2.0 - 1.0) * 0.5 + 0.5
                }
            }
            Self::ExponentialIn => 2.0f32.powf(10.0 * (t - 1.0)) - 0.001,
            Self::ExponentialOut => 1.0 - 2.0f32.powf(-10.0 * t),
            Self::ExponentialInOut => {
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * 2.0f32.powf(10.0 * (t - 1.0))
                } else {
                    0.5 * (2.0 - 2.0f32.powf(-10.0 * (t - 1.0)))
                }
            }
            Self::SineIn => 1.0 - (t * FRAC_PI_2).cos(),
            Self::SineOut => (t * FRAC_PI_2).sin(),
            Self::SineInOut => -0.5 * ((PI * t).cos() - 1.0),
            Self::BackIn => {
                let overshoot = BACK_OVERSHOOT;
                t * t * ((overshoot + 1.0) * t - overshoot)
            }
            Self::BackOut => {
                let overshoot = BACK_OVERSHOOT;
                let t = t - 1.0;
                t * t * ((overshoot + 1.0) * t + overshoot) + 1.0
            }
            Self::BackInOut => {
                let overshoot = BACK_OVERSHOOT * 1.525;
                let t = t * 2.0;
                if t < 1.0 {
                    t * t * ((overshoot + 1.0) * t - overshoot) / 2.0
                } else {
                    let t = t - 2.0;
                    t * t * ((overshoot + 1.0) * t + overshoot) / 2.0 + 1.0
                }
            }
        }
    }
}

fn sanitize_rate(rate: f32) -> f32 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        1.0
    }
}

fn sanitize_period(period: f32, fallback: f32) -> f32 {
    if period.is_finite() && period > 0.0 {
        period
    } else {
        fallback
    }
}

fn bounce_time(t: f32) -> f32 {
    if t < 1.0 / 2.75 {
        7.5625 * t * t
    } else if t < 2.0 / 2.75 {
        let t = t - 1.5 / 2.75;
        7.5625 * t * t + 0.75
    } else if t < 2.5 / 2.75 {
        let t = t - 2.25 / 2.75;
        7.5625 * t * t + 0.9375
    } else {
        let t = t - 2.625 / 2.75;
        7.5625 * t * t + 0.984375
    }
}
