//! Covariate definitions: which record field to bin, and how.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::engine::{
    correlate_categorical, correlate_continuous, BinnedCorrelation, ContinuousAxis,
    CorrelationError,
};
use crate::record::Record;

/// A covariate column of [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Bmi,
    Age,
    Country,
    PregnanciesBefore,
    Education,
    SleepPattern,
    Dedication,
    AverageCycleLength,
    CycleLengthStd,
    CycleRegularity,
    IntercourseFrequency,
}

impl Field {
    /// `true` for fields that carry a number.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Field::Country | Field::Education | Field::SleepPattern | Field::CycleRegularity
        )
    }

    /// Numeric value of the field, `None` if absent or not numeric.
    pub fn numeric(self, record: &Record) -> Option<f64> {
        match self {
            Field::Bmi => record.bmi,
            Field::Age => record.age,
            Field::PregnanciesBefore => record.pregnancies_before.map(f64::from),
            Field::Dedication => record.dedication,
            Field::AverageCycleLength => record.average_cycle_length,
            Field::CycleLengthStd => record.cycle_length_std,
            Field::IntercourseFrequency => record.intercourse_frequency,
            Field::Country | Field::Education | Field::SleepPattern | Field::CycleRegularity => {
                None
            }
        }
    }

    /// Category label of the field. Numeric fields are labelled by their
    /// printed value so they can also be treated as categories.
    pub fn label(self, record: &Record) -> Option<Cow<'_, str>> {
        let text = match self {
            Field::Country => record.country.as_deref(),
            Field::Education => record.education.as_deref(),
            Field::SleepPattern => record.sleep_pattern.as_deref(),
            Field::CycleRegularity => record.cycle_regularity.as_deref(),
            _ => return self.numeric(record).map(|v| Cow::Owned(v.to_string())),
        };
        text.map(Cow::Borrowed)
    }
}

/// How a covariate is binned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovariateKind {
    Continuous(ContinuousAxis),
    Categorical,
}

/// One covariate to correlate against cycles-to-pregnancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Covariate {
    /// Short identifier, used in artifact file names.
    pub name: String,
    /// Human-readable axis title.
    pub label: String,
    pub field: Field,
    pub kind: CovariateKind,
}

impl Covariate {
    pub fn continuous(name: &str, label: &str, field: Field, axis: ContinuousAxis) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field,
            kind: CovariateKind::Continuous(axis),
        }
    }

    pub fn categorical(name: &str, label: &str, field: Field) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field,
            kind: CovariateKind::Categorical,
        }
    }

    /// Correlates this covariate with `cycles_trying` over the pregnant
    /// records that have the field present.
    ///
    /// # Errors
    ///
    /// Whatever the engine reports; [`CorrelationError::EmptyInput`] when no
    /// pregnant record carries the field.
    pub fn evaluate<'a, I>(&self, records: I) -> Result<BinnedCorrelation, CorrelationError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let pregnant = records.into_iter().filter(|r| r.outcome.is_pregnant());
        match self.kind {
            CovariateKind::Continuous(axis) => {
                let pairs: Vec<(f64, f64)> = pregnant
                    .filter_map(|r| Some((self.field.numeric(r)?, f64::from(r.cycles_trying))))
                    .collect();
                correlate_continuous(&pairs, axis)
            }
            CovariateKind::Categorical => {
                let pairs: Vec<(Cow<'_, str>, f64)> = pregnant
                    .filter_map(|r| Some((self.field.label(r)?, f64::from(r.cycles_trying))))
                    .collect();
                correlate_categorical(&pairs)
            }
        }
    }
}

/// The standard covariate table.
pub fn default_covariates() -> Vec<Covariate> {
    vec![
        Covariate::continuous("BMI", "BMI", Field::Bmi, ContinuousAxis::new(25, 15.0, 40.0)),
        Covariate::continuous("Age", "Age", Field::Age, ContinuousAxis::new(23, 21.5, 44.5)),
        Covariate::categorical("Country", "Country", Field::Country),
        Covariate::continuous(
            "pregnant_before",
            "Number of previous pregnancies",
            Field::PregnanciesBefore,
            ContinuousAxis::new(4, -0.5, 3.5),
        ),
        Covariate::categorical("education", "Education", Field::Education),
        Covariate::categorical("sleeping_pattern", "Sleeping pattern", Field::SleepPattern),
        Covariate::continuous(
            "dedication",
            "Dedication",
            Field::Dedication,
            ContinuousAxis::new(30, 0.0, 1.0),
        ),
        Covariate::continuous(
            "average_cycle_length",
            "Average cycle length",
            Field::AverageCycleLength,
            ContinuousAxis::new(20, 20.0, 40.0),
        ),
        Covariate::continuous(
            "cycle_length_std",
            "Standard deviation of cycle length",
            Field::CycleLengthStd,
            ContinuousAxis::new(20, 0.0, 9.0),
        ),
        Covariate::categorical("regular_cycle", "Regular cycle", Field::CycleRegularity),
        Covariate::continuous(
            "intercourse_frequency",
            "Intercourse frequency",
            Field::IntercourseFrequency,
            ContinuousAxis::new(20, 0.0, 0.8),
        ),
    ]
}
