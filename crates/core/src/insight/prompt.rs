use crate::types::BatteryStats;

/// How much analysis to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightDepth {
    /// Threshold-triggered summary.
    Quick,
    /// Manual "deep analyze".
    Deep,
}

const SYSTEM_PROMPT: &str = "\
You are a battery health assistant embedded in a device dashboard. \
Reply with a single JSON object and nothing else. The object must have exactly these keys: \
\"status\" (string, one short sentence), \
\"recommendation\" (string), \
\"estimatedLifeRemaining\" (string, human readable, e.g. \"about 3 hours\"), \
\"optimizationTips\" (array of exactly 3 short strings).";

pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Render current stats into the user prompt.
pub fn build_prompt(stats: &BatteryStats, depth: InsightDepth) -> String {
    let mut out = String::with_capacity(512);
    out.push_str("Current battery readings:\n");
    out.push_str(&format!("- level: {}%\n", stats.level));
    out.push_str(&format!(
        "- charging: {}\n",
        if stats.charging { "yes" } else { "no" }
    ));
    out.push_str(&format!("- temperature: {:.1} °C\n", stats.temperature));
    out.push_str(&format!("- voltage: {:.2} V\n", stats.voltage));
    out.push_str(&format!("- health: {}\n", stats.health.as_str()));
    let remaining = stats.time_remaining();
    if remaining.as_secs().is_some() {
        let label = if stats.charging { "time to full" } else { "time to empty" };
        out.push_str(&format!("- platform {label} estimate: {remaining}\n"));
    }

    match depth {
        InsightDepth::Quick => {
            out.push_str("\nGive a brief assessment of the battery's current state.");
        }
        InsightDepth::Deep => {
            out.push_str(
                "\nGive an in-depth analysis: relate temperature and voltage to the charge level, \
                 call out anything abnormal, and make the recommendation specific to these readings.",
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatteryHealth, TimeEstimate};

    fn stats() -> BatteryStats {
        BatteryStats {
            level: 42,
            charging: false,
            charging_time: TimeEstimate::Infinite,
            discharging_time: TimeEstimate::Seconds(5400),
            temperature: 33.26,
            voltage: 3.912,
            health: BatteryHealth::Fair,
        }
    }

    #[test]
    fn prompt_embeds_readings() {
        let p = build_prompt(&stats(), InsightDepth::Quick);
        assert!(p.contains("level: 42%"));
        assert!(p.contains("charging: no"));
        assert!(p.contains("temperature: 33.3 °C"));
        assert!(p.contains("voltage: 3.91 V"));
        assert!(p.contains("health: Fair"));
        assert!(p.contains("time to empty estimate: 1h 30m"));
    }

    #[test]
    fn infinite_estimate_is_omitted() {
        let mut s = stats();
        s.discharging_time = TimeEstimate::Infinite;
        let p = build_prompt(&s, InsightDepth::Quick);
        assert!(!p.contains("estimate"));
    }

    #[test]
    fn deep_prompt_asks_for_more() {
        let quick = build_prompt(&stats(), InsightDepth::Quick);
        let deep = build_prompt(&stats(), InsightDepth::Deep);
        assert!(deep.contains("in-depth"));
        assert!(!quick.contains("in-depth"));
    }

    #[test]
    fn system_prompt_names_every_key() {
        for key in ["status", "recommendation", "estimatedLifeRemaining", "optimizationTips"] {
            assert!(system_prompt().contains(key));
        }
    }
}
