use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::domain::customer::Customer;
use crate::domain::ledger::ConstructionLedger;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    A,
    B,
    C,
    D,
}

impl Segment {
    fn from_score(score: i64) -> Self {
        match score {
            s if s >= 80 => Self::A,
            s if s >= 60 => Self::B,
            s if s >= 40 => Self::C,
            _ => Self::D,
        }
    }

    fn strategy(&self) -> &'static str {
        match self {
            Self::A => {
                "Key account. Visit regularly, offer premium service and bring new projects to them first."
            }
            Self::B => {
                "Valued account. Follow up regularly and cross-sell to grow revenue toward segment A."
            }
            Self::C => {
                "Standard account. Follow up efficiently and propose at the right moment to raise order frequency."
            }
            Self::D => {
                "At-risk account. Likely to go dormant; make contact soon and find out what is blocking them."
            }
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

const HIGH_RISK_ADVICE: &str =
    " High risk: the last deal is long ago or growth is slowing. Follow up immediately.";

/// Trading history of one customer.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: i32,
    pub customer_name: String,
    pub total_revenue_cents: i64,
    pub ledger_count: usize,
    /// Mean expected profit rate of the customer's ledgers, in percent.
    pub average_profit_rate: f64,
    pub last_ledger_date: Option<NaiveDate>,
    /// Revenue of the last 12 months against the 12 months before, in percent.
    pub growth_rate: f64,
}

impl CustomerMetrics {
    /// Derive metrics from the ledgers that belong to `customer`.
    pub fn from_ledgers(customer: &Customer, ledgers: &[ConstructionLedger], today: NaiveDate) -> Self {
        let own: Vec<&ConstructionLedger> = ledgers
            .iter()
            .filter(|ledger| ledger.customer_id == Some(customer.id))
            .collect();

        let total_revenue: i64 = own.iter().map(|ledger| ledger.contract_amount_cents).sum();
        let average_profit_rate = if own.is_empty() {
            0.0
        } else {
            own.iter().map(|ledger| ledger.expected_profit_rate()).sum::<f64>() / own.len() as f64
        };
        let last_ledger_date = own.iter().map(|ledger| ledger.created_at.date()).max();

        let year_ago = today - Duration::days(365);
        let two_years_ago = today - Duration::days(730);
        let mut recent = 0i64;
        let mut previous = 0i64;
        for ledger in &own {
            let date = ledger.created_at.date();
            if date > year_ago {
                recent += ledger.contract_amount_cents;
            } else if date > two_years_ago {
                previous += ledger.contract_amount_cents;
            }
        }
        let growth_rate = if previous > 0 {
            (recent - previous) as f64 / previous as f64 * 100.0
        } else if recent > 0 {
            100.0
        } else {
            0.0
        };

        Self {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            total_revenue_cents: total_revenue,
            ledger_count: own.len(),
            average_profit_rate,
            last_ledger_date,
            growth_rate,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ScoreFactors {
    pub revenue: i64,
    pub frequency: i64,
    pub profitability: i64,
    pub recency: i64,
    pub growth: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CustomerSegmentation {
    pub segment: Segment,
    pub score: i64,
    pub factors: ScoreFactors,
    pub metrics: CustomerMetrics,
    pub strategy: String,
    pub risk: RiskLevel,
}

fn tiered(value: f64, thresholds: [f64; 4]) -> i64 {
    const SCORES: [i64; 4] = [100, 80, 60, 40];
    thresholds
        .iter()
        .zip(SCORES)
        .find(|(threshold, _)| value >= **threshold)
        .map(|(_, score)| score)
        .unwrap_or(20)
}

fn recency_score(days: Option<i64>) -> i64 {
    match days {
        Some(d) if d <= 30 => 100,
        Some(d) if d <= 60 => 80,
        Some(d) if d <= 90 => 60,
        Some(d) if d <= 120 => 40,
        _ => 20,
    }
}

/// Score a customer and assign a segment, risk level and strategy.
pub fn segment_customer(metrics: CustomerMetrics, today: NaiveDate) -> CustomerSegmentation {
    let factors = ScoreFactors {
        revenue: tiered(
            metrics.total_revenue_cents as f64,
            [100_000_000.0, 50_000_000.0, 20_000_000.0, 10_000_000.0],
        ),
        frequency: tiered(metrics.ledger_count as f64, [20.0, 10.0, 5.0, 3.0]),
        profitability: tiered(metrics.average_profit_rate, [28.0, 25.0, 22.0, 20.0]),
        recency: recency_score(
            metrics
                .last_ledger_date
                .map(|date| (today - date).num_days()),
        ),
        growth: tiered(metrics.growth_rate, [10.0, 5.0, 0.0, -5.0]),
    };

    let score = (factors.revenue as f64 * 0.3
        + factors.frequency as f64 * 0.25
        + factors.profitability as f64 * 0.2
        + factors.recency as f64 * 0.15
        + factors.growth as f64 * 0.1)
        .round() as i64;
    let segment = Segment::from_score(score);

    let risk = if factors.recency <= 40 || factors.growth <= 40 {
        RiskLevel::High
    } else if factors.recency <= 60 || factors.growth <= 60 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut strategy = segment.strategy().to_string();
    if risk == RiskLevel::High {
        strategy.push_str(HIGH_RISK_ADVICE);
    }

    CustomerSegmentation {
        segment,
        score,
        factors,
        metrics,
        strategy,
        risk,
    }
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct SegmentTotals {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
}

impl SegmentTotals {
    fn bump(&mut self, segment: Segment, amount: i64) {
        match segment {
            Segment::A => self.a += amount,
            Segment::B => self.b += amount,
            Segment::C => self.c += amount,
            Segment::D => self.d += amount,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct SegmentationSummary {
    pub total: usize,
    /// Customers per segment.
    pub counts: SegmentTotals,
    pub high_risk: usize,
    pub average_score: f64,
    pub total_revenue_cents: i64,
    pub revenue_by_segment: SegmentTotals,
}

pub fn summarize(segmentations: &[CustomerSegmentation]) -> SegmentationSummary {
    let mut summary = SegmentationSummary {
        total: segmentations.len(),
        ..SegmentationSummary::default()
    };

    for item in segmentations {
        summary.counts.bump(item.segment, 1);
        summary
            .revenue_by_segment
            .bump(item.segment, item.metrics.total_revenue_cents);
        summary.total_revenue_cents += item.metrics.total_revenue_cents;
        if item.risk == RiskLevel::High {
            summary.high_risk += 1;
        }
    }

    if !segmentations.is_empty() {
        summary.average_score = segmentations.iter().map(|item| item.score as f64).sum::<f64>()
            / segmentations.len() as f64;
    }

    summary
}
