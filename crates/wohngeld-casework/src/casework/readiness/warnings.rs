use super::super::domain::Client;

const GERMAN_IBAN_LENGTH: usize = 22;
const IBAN_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 15..=34;

/// Soft findings that never block a draft.
pub(crate) fn consistency_warnings(client: &Client) -> Vec<String> {
    let mut warnings = Vec::new();

    if !client.active {
        warnings.push("Klient ist als inaktiv markiert".to_string());
    }

    if client.heating_included == Some(true) {
        if let Some(cost) = client.heating_cost.filter(|cost| *cost > 0.0) {
            warnings.push(format!(
                "Heizkosten sind als in der Miete enthalten markiert, zusätzlich sind {cost:.2} EUR angegeben"
            ));
        }
    }

    if client.hot_water_included == Some(true) {
        if let Some(cost) = client.hot_water_cost.filter(|cost| *cost > 0.0) {
            warnings.push(format!(
                "Warmwasserkosten sind als in der Miete enthalten markiert, zusätzlich sind {cost:.2} EUR angegeben"
            ));
        }
    }

    let has_care_level = client
        .care_level
        .as_deref()
        .is_some_and(|level| !level.trim().is_empty());
    if has_care_level && client.disability_or_care != Some(true) {
        warnings.push(
            "Pflegegrad ist angegeben, Schwerbehinderung/Pflege ist aber nicht markiert".to_string(),
        );
    }

    if let Some(iban) = client.iban.as_deref() {
        let compact: String = iban.chars().filter(|c| !c.is_whitespace()).collect();
        if !compact.is_empty() && !plausible_iban_length(&compact) {
            warnings.push(format!(
                "IBAN hat eine ungewöhnliche Länge ({} Zeichen)",
                compact.chars().count()
            ));
        }
    }

    warnings
}

fn plausible_iban_length(compact: &str) -> bool {
    let length = compact.chars().count();
    if compact.to_ascii_uppercase().starts_with("DE") {
        length == GERMAN_IBAN_LENGTH
    } else {
        IBAN_LENGTH_RANGE.contains(&length)
    }
}
