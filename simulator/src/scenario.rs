//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario. Codes and rates are kept as text, the way an
/// administrator would type them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Create a coin.
    CreateCoin {
        code: String,
        name: String,
        symbol: String,
        back: bool,
        rate: String,
        main: bool,
    },
    /// Make a coin main.
    SetMain { code: String },
    /// Set a coin's rate by administrative update.
    UpdateRate { code: String, rate: String },
    /// Deactivate a coin.
    Deactivate { code: String },
    /// Delete a coin.
    Delete { code: String, force: bool },
    /// Inject a fault.
    InjectFault { fault_type: FaultType },
    /// Run main switches against concurrent readers.
    Concurrent { switches: usize, readers: usize },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FaultType {
    /// The next store commit fails.
    CommitFailure,
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    /// Exactly one main coin, at rate 1.
    SingleMain,
    /// The main coin has this code.
    MainIs { code: String },
    /// No coin is main.
    NoMain,
    /// A coin's stored rate.
    RateEquals { code: String, rate: String },
    /// The last write step failed.
    LastWriteFailed,
    /// A conversion result.
    ConvertEquals {
        amount: i64,
        from: String,
        to: String,
        expected: i64,
    },
    /// A formatted amount.
    FormatEquals {
        amount: i64,
        code: String,
        expected: String,
    },
    /// The currency resolved for a request.
    ResolvesTo {
        header: Option<String>,
        param: Option<String>,
        stored: Option<String>,
        expected: String,
    },
}

impl Scenario {
    /// Load a scenario by name, or from a JSON file when `name` ends in
    /// `.json`.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        if name.ends_with(".json") {
            let raw = std::fs::read_to_string(name)?;
            return Self::from_json(&raw);
        }

        match name {
            "rescale" => Ok(Self::rescale()),
            "delete-guard" => Ok(Self::delete_guard()),
            "failure-recovery" => Ok(Self::failure_recovery()),
            "display" => Ok(Self::display()),
            "concurrent-switch" => Ok(Self::concurrent_switch()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Parse a scenario from JSON.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Names of the built-in scenarios.
    pub fn names() -> &'static [&'static str] {
        &[
            "rescale",
            "delete-guard",
            "failure-recovery",
            "display",
            "concurrent-switch",
        ]
    }

    /// Switch main from AAA to BBB and check every rate follows.
    fn rescale() -> Self {
        Self {
            name: "rescale".to_string(),
            description: "Main switch re-expresses rates relative to the new main".to_string(),
            steps: vec![
                create("AAA", "1", true),
                create("BBB", "2", false),
                create("CCC", "0.5", false),
                ScenarioStep::SetMain {
                    code: "BBB".to_string(),
                },
                check(AssertCondition::SingleMain),
                check(AssertCondition::MainIs {
                    code: "BBB".to_string(),
                }),
                rate_equals("AAA", "0.5"),
                rate_equals("CCC", "0.25"),
                // Switching to the current main changes nothing.
                ScenarioStep::SetMain {
                    code: "BBB".to_string(),
                },
                rate_equals("AAA", "0.5"),
            ],
        }
    }

    /// The main coin is only deleted when forced.
    fn delete_guard() -> Self {
        Self {
            name: "delete-guard".to_string(),
            description: "Deleting the main coin requires force".to_string(),
            steps: vec![
                ScenarioStep::Delete {
                    code: "USD".to_string(),
                    force: false,
                },
                check(AssertCondition::LastWriteFailed),
                check(AssertCondition::SingleMain),
                ScenarioStep::Delete {
                    code: "USD".to_string(),
                    force: true,
                },
                check(AssertCondition::NoMain),
                ScenarioStep::SetMain {
                    code: "EUR".to_string(),
                },
                check(AssertCondition::SingleMain),
            ],
        }
    }

    /// A failed commit leaves every rate as it was.
    fn failure_recovery() -> Self {
        Self {
            name: "failure-recovery".to_string(),
            description: "Commit failure during a main switch, then retry".to_string(),
            steps: vec![
                ScenarioStep::InjectFault {
                    fault_type: FaultType::CommitFailure,
                },
                ScenarioStep::SetMain {
                    code: "EUR".to_string(),
                },
                check(AssertCondition::LastWriteFailed),
                check(AssertCondition::MainIs {
                    code: "USD".to_string(),
                }),
                rate_equals("EUR", "0.92"),
                // Retry
                ScenarioStep::SetMain {
                    code: "EUR".to_string(),
                },
                check(AssertCondition::MainIs {
                    code: "EUR".to_string(),
                }),
                rate_equals("USD", "1.087"),
            ],
        }
    }

    /// Conversion, formatting and resolution on the default tenant.
    fn display() -> Self {
        Self {
            name: "display".to_string(),
            description: "Conversion, formatting and currency resolution".to_string(),
            steps: vec![
                check(AssertCondition::ConvertEquals {
                    amount: 1000,
                    from: "USD".to_string(),
                    to: "EUR".to_string(),
                    expected: 920,
                }),
                check(AssertCondition::ConvertEquals {
                    amount: 1000,
                    from: "NOPE".to_string(),
                    to: "EUR".to_string(),
                    expected: 920,
                }),
                check(AssertCondition::FormatEquals {
                    amount: 150_000,
                    code: "USD".to_string(),
                    expected: "$1,500.00".to_string(),
                }),
                check(AssertCondition::FormatEquals {
                    amount: 150_000,
                    code: "EUR".to_string(),
                    expected: "1,500.00€".to_string(),
                }),
                ScenarioStep::Deactivate {
                    code: "GBP".to_string(),
                },
                check(AssertCondition::ResolvesTo {
                    header: Some("EUR".to_string()),
                    param: Some("GBP".to_string()),
                    stored: Some("USD".to_string()),
                    expected: "EUR".to_string(),
                }),
                check(AssertCondition::ResolvesTo {
                    header: None,
                    param: Some("GBP".to_string()),
                    stored: Some("EUR".to_string()),
                    expected: "EUR".to_string(),
                }),
                check(AssertCondition::ResolvesTo {
                    header: None,
                    param: Some("GBP".to_string()),
                    stored: None,
                    expected: "USD".to_string(),
                }),
                ScenarioStep::UpdateRate {
                    code: "EUR".to_string(),
                    rate: "0.95".to_string(),
                },
                check(AssertCondition::ConvertEquals {
                    amount: 1000,
                    from: "USD".to_string(),
                    to: "EUR".to_string(),
                    expected: 950,
                }),
            ],
        }
    }

    /// Many main switches racing many readers.
    fn concurrent_switch() -> Self {
        Self {
            name: "concurrent-switch".to_string(),
            description: "Concurrent main switches never expose a torn coin set".to_string(),
            steps: vec![
                ScenarioStep::Concurrent {
                    switches: 50,
                    readers: 16,
                },
                check(AssertCondition::SingleMain),
            ],
        }
    }
}

fn create(code: &str, rate: &str, main: bool) -> ScenarioStep {
    ScenarioStep::CreateCoin {
        code: code.to_string(),
        name: format!("Coin {code}"),
        symbol: code[..1].to_string(),
        back: false,
        rate: rate.to_string(),
        main,
    }
}

fn check(condition: AssertCondition) -> ScenarioStep {
    ScenarioStep::Assert { condition }
}

fn rate_equals(code: &str, rate: &str) -> ScenarioStep {
    check(AssertCondition::RateEquals {
        code: code.to_string(),
        rate: rate.to_string(),
    })
}
