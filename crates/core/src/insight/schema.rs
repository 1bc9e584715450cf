use crate::insight::InsightError;
use crate::types::BatteryInsight;

/// Tips beyond this count are dropped.
pub const MAX_TIPS: usize = 3;

/// Parse a model reply into a validated insight. Tolerates markdown fences
/// and stray prose around the object.
pub fn parse_insight(raw: &str) -> Result<BatteryInsight, InsightError> {
    let body = extract_object(raw)
        .ok_or_else(|| InsightError::Malformed("no JSON object in response".into()))?;
    let mut insight: BatteryInsight =
        serde_json::from_str(body).map_err(|e| InsightError::Malformed(e.to_string()))?;
    validate(&mut insight)?;
    Ok(insight)
}

/// Slice from the first `{` to the last `}`.
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn validate(insight: &mut BatteryInsight) -> Result<(), InsightError> {
    for (field, value) in [
        ("status", &insight.status),
        ("recommendation", &insight.recommendation),
        ("estimatedLifeRemaining", &insight.estimated_life_remaining),
    ] {
        if value.trim().is_empty() {
            return Err(InsightError::Schema(format!("{field} is empty")));
        }
    }

    insight.optimization_tips.retain(|t| !t.trim().is_empty());
    if insight.optimization_tips.is_empty() {
        return Err(InsightError::Schema("optimizationTips is empty".into()));
    }
    if insight.optimization_tips.len() != MAX_TIPS {
        tracing::debug!(
            tips = insight.optimization_tips.len(),
            "insight tip count differs from expected"
        );
    }
    insight.optimization_tips.truncate(MAX_TIPS);
    Ok(())
}
