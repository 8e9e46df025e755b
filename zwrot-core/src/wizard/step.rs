use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StepParseError;

/// Steps of the claim wizard, in the order they are presented.
///
/// - Home: data overview, refresh and portal launch actions
/// - Step1: review service dates
/// - Step2: copy invoice fields into the insurer portal
/// - Step3: bank account details and PDF merge
/// - Summary: submitted claim summary and clean-up
///
/// Any step may be navigated to at any time; the wizard does not check
/// that earlier steps were visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Home,
    Step1,
    Step2,
    Step3,
    Summary,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Home,
        WizardStep::Step1,
        WizardStep::Step2,
        WizardStep::Step3,
        WizardStep::Summary,
    ];

    /// Step token stored in the navigable history.
    ///
    /// `Home` has no token so the root location stays clean.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            WizardStep::Home => None,
            WizardStep::Step1 => Some("step1"),
            WizardStep::Step2 => Some("step2"),
            WizardStep::Step3 => Some("step3"),
            WizardStep::Summary => Some("summary"),
        }
    }

    /// Derives the step from a history token.
    ///
    /// A leading `#` is ignored. Missing, empty or unknown tokens map to
    /// `Home`.
    pub fn from_token(token: Option<&str>) -> Self {
        token
            .map(|t| t.trim_start_matches('#'))
            .and_then(|t| t.parse().ok())
            .unwrap_or(WizardStep::Home)
    }

    /// Following step; `Summary` stays put.
    pub fn next(&self) -> Self {
        let idx = self.index();
        Self::ALL[(idx + 1).min(Self::ALL.len() - 1)]
    }

    /// Preceding step; `Home` stays put.
    pub fn previous(&self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }

    fn index(&self) -> usize {
        match self {
            WizardStep::Home => 0,
            WizardStep::Step1 => 1,
            WizardStep::Step2 => 2,
            WizardStep::Step3 => 3,
            WizardStep::Summary => 4,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token().unwrap_or("home"))
    }
}

impl FromStr for WizardStep {
    type Err = StepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(WizardStep::Home),
            "step1" => Ok(WizardStep::Step1),
            "step2" => Ok(WizardStep::Step2),
            "step3" => Ok(WizardStep::Step3),
            "summary" => Ok(WizardStep::Summary),
            other => Err(StepParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_for_every_step() {
        for step in WizardStep::ALL {
            assert_eq!(WizardStep::from_token(step.token()), step);
        }
    }

    #[test]
    fn test_home_has_no_token() {
        assert_eq!(WizardStep::Home.token(), None);
        assert_eq!(WizardStep::from_token(Some("")), WizardStep::Home);
        assert_eq!(WizardStep::from_token(Some("#")), WizardStep::Home);
    }

    #[test]
    fn test_hash_prefix_and_unknown_tokens() {
        assert_eq!(WizardStep::from_token(Some("#step2")), WizardStep::Step2);
        assert_eq!(WizardStep::from_token(Some("step9")), WizardStep::Home);
        assert_eq!(WizardStep::from_token(Some("STEP1")), WizardStep::Home);
    }

    #[test]
    fn test_next_and_previous_saturate() {
        assert_eq!(WizardStep::Home.next(), WizardStep::Step1);
        assert_eq!(WizardStep::Step3.next(), WizardStep::Summary);
        assert_eq!(WizardStep::Summary.next(), WizardStep::Summary);
        assert_eq!(WizardStep::Step1.previous(), WizardStep::Home);
        assert_eq!(WizardStep::Home.previous(), WizardStep::Home);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "finish".parse::<WizardStep>(),
            Err(StepParseError("finish".to_string()))
        );
        assert_eq!("summary".parse::<WizardStep>(), Ok(WizardStep::Summary));
    }
}
