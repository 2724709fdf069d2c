mod parse;

use chrono::{NaiveDateTime, Timelike};
use rand::Rng;

use dispatch_core::{LogisticsEvent, PredictedEta, RouteStatus, Severity};

pub use parse::{format_eta_minutes, parse_eta_minutes};

/// Hours (local time) counted as rush traffic: [7, 9) and [16, 18).
const RUSH_HOURS: [u32; 4] = [7, 8, 16, 17];

/// Tuning knobs for the prediction model. Every stochastic or calibrated
/// effect is a field here so tests can pin any branch.
#[derive(Clone, Debug)]
pub struct PredictorConfig {
    /// Multiplier applied to remaining minutes inside a rush window. Kept
    /// below 1.0 on purpose: the nominal estimate already prices congestion
    /// in, and the adjustment catches the display up to elapsed congestion.
    /// Matches long-observed upstream behavior; pending product review.
    pub rush_hour_factor: f64,
    /// A uniform draw in [0, 1) at or above this value counts as adverse
    /// weather. Adverse weather dents confidence, never the time itself.
    pub adverse_weather_threshold: f64,
    pub weather_confidence_penalty: i32,
    /// Half-width of the uniform perturbation applied to remaining minutes,
    /// so repeated predictions are not bit-identical. Zero disables it.
    pub noise_minutes: f64,
    /// Confidence for an immediate, undisturbed arrival.
    pub base_confidence: i32,
    /// Confidence drops one point per this many remaining minutes.
    pub minutes_per_confidence_point: f64,
    pub warning_confidence_penalty: i32,
    pub critical_confidence_penalty: i32,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            rush_hour_factor: 0.85,
            adverse_weather_threshold: 0.8,
            weather_confidence_penalty: 15,
            noise_minutes: 2.0,
            base_confidence: 95,
            minutes_per_confidence_point: 15.0,
            warning_confidence_penalty: 5,
            critical_confidence_penalty: 15,
        }
    }
}

/// Accumulated per-vehicle anomaly state, reduced to what the prediction
/// model consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnomalySignal {
    pub warnings: u32,
    pub criticals: u32,
    /// Sum of reported `impact_minutes` across all events.
    pub impact_minutes: u32,
}

impl AnomalySignal {
    pub fn from_events(events: &[LogisticsEvent]) -> Self {
        let mut signal = Self::default();
        for event in events {
            match event.severity {
                Severity::Info => {}
                Severity::Warning => signal.warnings += 1,
                Severity::Critical => signal.criticals += 1,
            }
            signal.impact_minutes += event.impact_minutes.unwrap_or(0);
        }
        signal
    }
}

#[derive(Clone, Debug, Default)]
pub struct Predictor {
    config: PredictorConfig,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    /// Predicts arrival time and confidence from a nominal remaining-time
    /// string.
    ///
    /// A completed route short-circuits to the delivered marker at full
    /// confidence. An unparseable nominal string is echoed back verbatim at
    /// confidence 50, the declared "I don't know" state; callers must treat
    /// that value as a sentinel, not an estimate. All randomness (weather
    /// draw, noise) comes from the caller's `rng`, so identical inputs and
    /// generator state reproduce identical predictions.
    pub fn predict<R: Rng>(
        &self,
        status: RouteStatus,
        nominal_eta: &str,
        now: NaiveDateTime,
        anomalies: &AnomalySignal,
        rng: &mut R,
    ) -> PredictedEta {
        if status == RouteStatus::Completed {
            return PredictedEta::delivered();
        }

        let Some(parsed) = parse_eta_minutes(nominal_eta) else {
            return PredictedEta {
                time: nominal_eta.to_string(),
                confidence: PredictedEta::MIN_CONFIDENCE,
            };
        };

        let cfg = &self.config;
        let mut minutes = parsed as f64;
        if RUSH_HOURS.contains(&now.hour()) {
            minutes *= cfg.rush_hour_factor;
        }
        minutes += anomalies.impact_minutes as f64;

        let adverse_weather = rng.gen::<f64>() >= cfg.adverse_weather_threshold;
        if cfg.noise_minutes > 0.0 {
            minutes += rng.gen_range(-cfg.noise_minutes..cfg.noise_minutes);
        }
        minutes = minutes.max(0.0);

        let mut confidence =
            cfg.base_confidence - (minutes / cfg.minutes_per_confidence_point) as i32;
        if adverse_weather {
            confidence -= cfg.weather_confidence_penalty;
        }
        confidence -= anomalies.warnings as i32 * cfg.warning_confidence_penalty;
        confidence -= anomalies.criticals as i32 * cfg.critical_confidence_penalty;

        PredictedEta::clamped(format_eta_minutes(minutes.round() as u32), confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    /// Deterministic: no noise, weather never adverse.
    fn pinned() -> Predictor {
        Predictor::new(PredictorConfig {
            noise_minutes: 0.0,
            adverse_weather_threshold: 2.0,
            ..PredictorConfig::default()
        })
    }

    #[test]
    fn completed_route_is_certain() {
        let eta = Predictor::default().predict(
            RouteStatus::Completed,
            "3h 0m",
            at(8, 0),
            &AnomalySignal::default(),
            &mut rng(1),
        );
        assert_eq!(eta, PredictedEta::delivered());
    }

    #[test]
    fn malformed_input_echoes_verbatim_at_floor_confidence() {
        let eta = Predictor::default().predict(
            RouteStatus::InProgress,
            "2hours 30minutes",
            at(12, 0),
            &AnomalySignal::default(),
            &mut rng(1),
        );
        assert_eq!(eta.time, "2hours 30minutes");
        assert_eq!(eta.confidence, 50);
    }

    #[test]
    fn morning_rush_shortens_the_displayed_remainder() {
        // 60 nominal minutes at 08:00; even the widest noise draw stays
        // strictly under an hour.
        for seed in 0..32 {
            let eta = Predictor::default().predict(
                RouteStatus::InProgress,
                "1s 0m",
                at(8, 0),
                &AnomalySignal::default(),
                &mut rng(seed),
            );
            let minutes = parse_eta_minutes(&eta.time).unwrap();
            assert!(minutes < 60, "seed {seed}: got {minutes}");
        }
    }

    #[test]
    fn outside_rush_windows_time_is_untouched() {
        let eta = pinned().predict(
            RouteStatus::InProgress,
            "1h 0m",
            at(12, 0),
            &AnomalySignal::default(),
            &mut rng(1),
        );
        assert_eq!(eta.time, "1h 0m");
        assert!((50..=100).contains(&eta.confidence));
    }

    #[test]
    fn evening_rush_window_applies_too() {
        let eta = pinned().predict(
            RouteStatus::InProgress,
            "2h 0m",
            at(17, 59),
            &AnomalySignal::default(),
            &mut rng(1),
        );
        // 120 * 0.85 = 102 minutes.
        assert_eq!(eta.time, "1h 42m");
    }

    #[test]
    fn confidence_never_increases_with_remaining_duration() {
        let predictor = pinned();
        let mut last = u8::MAX;
        for nominal in ["10m", "1h 0m", "4h 0m", "12h 0m"] {
            let eta = predictor.predict(
                RouteStatus::InProgress,
                nominal,
                at(12, 0),
                &AnomalySignal::default(),
                &mut rng(7),
            );
            assert!(eta.confidence <= last, "{nominal} raised confidence");
            last = eta.confidence;
        }
        assert_eq!(last, 50);
    }

    #[test]
    fn adverse_weather_dents_confidence_only() {
        let calm = Predictor::new(PredictorConfig {
            noise_minutes: 0.0,
            adverse_weather_threshold: 2.0,
            ..PredictorConfig::default()
        });
        let stormy = Predictor::new(PredictorConfig {
            noise_minutes: 0.0,
            adverse_weather_threshold: 0.0,
            ..PredictorConfig::default()
        });

        let baseline = calm.predict(
            RouteStatus::InProgress,
            "1h 0m",
            at(12, 0),
            &AnomalySignal::default(),
            &mut rng(3),
        );
        let dented = stormy.predict(
            RouteStatus::InProgress,
            "1h 0m",
            at(12, 0),
            &AnomalySignal::default(),
            &mut rng(3),
        );
        assert_eq!(baseline.time, dented.time);
        assert_eq!(
            i32::from(baseline.confidence) - i32::from(dented.confidence),
            PredictorConfig::default().weather_confidence_penalty
        );
    }

    #[test]
    fn noise_varies_repeated_predictions() {
        let predictor = Predictor::default();
        let mut generator = rng(42);
        let times: Vec<String> = (0..16)
            .map(|_| {
                predictor
                    .predict(
                        RouteStatus::InProgress,
                        "3h 0m",
                        at(12, 0),
                        &AnomalySignal::default(),
                        &mut generator,
                    )
                    .time
            })
            .collect();
        assert!(times.iter().any(|t| t != &times[0]));
    }

    #[test]
    fn anomalies_extend_time_and_dent_confidence() {
        let predictor = pinned();
        let quiet = predictor.predict(
            RouteStatus::InProgress,
            "1h 0m",
            at(12, 0),
            &AnomalySignal::default(),
            &mut rng(5),
        );
        let signal = AnomalySignal {
            warnings: 1,
            criticals: 1,
            impact_minutes: 30,
        };
        let disturbed = predictor.predict(
            RouteStatus::InProgress,
            "1h 0m",
            at(12, 0),
            &signal,
            &mut rng(5),
        );
        assert_eq!(disturbed.time, "1h 30m");
        assert!(disturbed.confidence < quiet.confidence);
    }

    #[test]
    fn displayed_time_clamps_at_zero() {
        let predictor = Predictor::new(PredictorConfig {
            rush_hour_factor: 0.0,
            noise_minutes: 0.0,
            adverse_weather_threshold: 2.0,
            ..PredictorConfig::default()
        });
        let eta = predictor.predict(
            RouteStatus::InProgress,
            "5m",
            at(8, 30),
            &AnomalySignal::default(),
            &mut rng(1),
        );
        assert_eq!(eta.time, "0m");
    }

    #[test]
    fn anomaly_signal_reduces_events() {
        use chrono::Utc;
        use dispatch_core::VehicleId;
        let events = vec![
            LogisticsEvent {
                vehicle_id: VehicleId::new("v1"),
                severity: Severity::Info,
                impact_minutes: Some(3),
                created_at: Utc::now(),
            },
            LogisticsEvent {
                vehicle_id: VehicleId::new("v1"),
                severity: Severity::Warning,
                impact_minutes: None,
                created_at: Utc::now(),
            },
            LogisticsEvent {
                vehicle_id: VehicleId::new("v1"),
                severity: Severity::Critical,
                impact_minutes: Some(12),
                created_at: Utc::now(),
            },
        ];
        assert_eq!(
            AnomalySignal::from_events(&events),
            AnomalySignal {
                warnings: 1,
                criticals: 1,
                impact_minutes: 15,
            }
        );
    }
}
