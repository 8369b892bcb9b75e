use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::super::domain::{Client, DeadlineKind};

/// Value destined for a single form slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Checkbox(bool),
}

impl FormValue {
    /// Empty text and unchecked boxes leave the slot untouched.
    pub fn is_filled(&self) -> bool {
        match self {
            FormValue::Text(text) => !text.trim().is_empty(),
            FormValue::Checkbox(checked) => *checked,
        }
    }
}

/// Form slot name normalised for lookups across encodings.
pub fn normalize_slot_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'ä' => normalized.push_str("ae"),
            'Ä' => normalized.push_str("Ae"),
            'ö' => normalized.push_str("oe"),
            'Ö' => normalized.push_str("Oe"),
            'ü' => normalized.push_str("ue"),
            'Ü' => normalized.push_str("Ue"),
            'ß' => normalized.push_str("ss"),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => normalized.push(c),
            _ => {}
        }
    }
    normalized
}

/// Lower-cased, umlaut-folded value without separators, for matching free-text answers.
fn normalize_answer(value: Option<&str>) -> String {
    value
        .map(|raw| {
            normalize_slot_name(&raw.to_lowercase())
                .replace(['_', '-'], "")
        })
        .unwrap_or_default()
}

/// The form offers one box per IBAN character.
const MAX_IBAN_SLOTS: usize = 33;

fn money(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}

fn frequency(raw: Option<&str>) -> &'static str {
    let lowered = raw.unwrap_or_default().to_lowercase();
    if lowered.contains("jahr") || lowered.contains("annual") {
        "jährlich"
    } else if lowered.contains("tag") || lowered.contains("daily") {
        "täglich"
    } else {
        "monatlich"
    }
}

#[derive(Default)]
struct Slots(BTreeMap<String, FormValue>);

impl Slots {
    fn text(&mut self, name: &str, value: impl Into<Option<String>>) {
        if let Some(value) = value.into() {
            self.0.insert(name.to_string(), FormValue::Text(value));
        }
    }

    fn check(&mut self, name: &str, checked: bool) {
        self.0.insert(name.to_string(), FormValue::Checkbox(checked));
    }

    /// Yes/no pair where the form expects exactly one of two boxes.
    fn yes_no(&mut self, no: &str, yes: &str, answer: bool) {
        self.check(no, !answer);
        self.check(yes, answer);
    }
}

/// Maps a client record onto the slot names of the MZ1.3 housing-benefit form.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormFieldMapper;

impl FormFieldMapper {
    pub fn map(&self, client: &Client, kind: DeadlineKind) -> BTreeMap<String, FormValue> {
        let mut slots = Slots::default();

        application_type(&mut slots, client, kind);
        personal_details(&mut slots, client);
        address(&mut slots, client);
        housing(&mut slots, client);
        rent(&mut slots, client);
        income(&mut slots, client);
        payout(&mut slots, client);
        standard_answers(&mut slots, client);

        slots.0
    }

    /// Normalised names of every slot this mapper can produce for some client.
    pub fn known_slots(&self) -> BTreeSet<String> {
        let client = catalogue_client();
        [DeadlineKind::FirstApplication, DeadlineKind::Renewal]
            .into_iter()
            .flat_map(|kind| self.map(&client, kind).into_keys())
            .map(|name| normalize_slot_name(&name))
            .collect()
    }
}

/// Client with every optional value present, so each conditional slot is emitted.
fn catalogue_client() -> Client {
    let text = || Some("x".to_string());
    Client {
        birth_date: NaiveDate::from_ymd_opt(1970, 1, 1),
        nationality: text(),
        birth_name: text(),
        birth_place: text(),
        phone: text(),
        email: text(),
        living_area_sqm: Some(1.0),
        moved_in_on: NaiveDate::from_ymd_opt(2020, 1, 1),
        total_rent: Some(1.0),
        heating_included: Some(false),
        heating_cost: Some(1.0),
        hot_water_included: Some(false),
        hot_water_cost: Some(1.0),
        income_type: text(),
        gross_income: Some(1.0),
        iban: Some("X".repeat(MAX_IBAN_SLOTS)),
        bank_name: text(),
        benefit_number: text(),
        ..Client::default()
    }
}

fn application_type(slots: &mut Slots, client: &Client, kind: DeadlineKind) {
    let first = kind == DeadlineKind::FirstApplication;
    slots.check("MZ1.3-CB_AllgAntragstyp_Erstantrag", first);
    slots.check("MZ1.3-CB_AllgAntragstyp_Weiterleistungsantrag", !first);
    if !first {
        slots.text("MZ1.3-MTF_AllgWoGNR_AKZ", client.benefit_number.clone());
    }
}

fn personal_details(slots: &mut Slots, client: &Client) {
    slots.text("MZ1.3-ET_PersAngFamilienname", client.last_name.clone());
    slots.text("MZ1.3-ET_PersAngVornamen", client.first_name.clone());
    slots.text(
        "MZ1.3-DA_PersAngGeburtsdatum",
        client
            .birth_date
            .map(|date| date.format("%d.%m.%Y").to_string()),
    );
    slots.text("MZ1.3-ET_PersAngGeburtsort", client.birth_place.clone());
    slots.text("MZ1.3-ET_PersAngGeburtsname", client.birth_name.clone());
    slots.text("MZ1.3-ET_PersAngStaatsangehörigkeit", client.nationality.clone());
    slots.text("MZ1.3-ET_PersAngTelefonnummer", client.phone.clone());
    slots.text("MZ1.3-ET_PersAngE-Mail", client.email.clone());

    let gender = normalize_answer(client.gender.as_deref());
    slots.check("MZ1.3-CB_PersAngGeschlechtMännlich", gender == "maennlich");
    slots.check("MZ1.3-CB_PersAngGeschlechtWeiblich", gender == "weiblich");
    slots.check("MZ1.3-CB_PersAngGeschlechtDivers", gender == "divers");
    slots.check(
        "MZ1.3-CB_PersAngGeschlechtKeineAngabe",
        gender == "keineangabe",
    );

    let marital = normalize_answer(client.marital_status.as_deref());
    slots.check("MZ1.3-CB_PersAngFamStandledig", marital == "ledig");
    slots.check("MZ1.3-CB_PersAngFamStandverheiratet", marital == "verheiratet");
    slots.check(
        "MZ1.3-CB_PersAngFamStandgetrenntlebend",
        marital.contains("getrennt"),
    );
    slots.check(
        "MZ1.3-CB_PersAngFamStandeingLebenspartner",
        marital.contains("lebenspartner") && !marital.contains("nichtehelich"),
    );
    slots.check("MZ1.3-CB_PersAngFamStandgeschieden", marital == "geschieden");
    slots.check("MZ1.3-CB_PersAngFamStandverwitwet", marital == "verwitwet");
    slots.check(
        "MZ1.3-CB_PersAngFamStandnichtehelicheLebenspartner",
        marital.contains("nichtehelich"),
    );

    let employment = normalize_answer(client.employment_status.as_deref());
    slots.check(
        "MZ1.3-CB_PersAngErwerbArbeitnehmer",
        matches!(employment.as_str(), "erwerbstaetig" | "arbeitnehmer"),
    );
    slots.check(
        "MZ1.3-CB_PersAngErwerbSelbständiger",
        employment.contains("selbst"),
    );
    slots.check(
        "MZ1.3-CB_PersAngErwerbAzubi",
        matches!(employment.as_str(), "azubi" | "schueler" | "student"),
    );
    slots.check(
        "MZ1.3-CB_PersAngErwerbRentner",
        matches!(employment.as_str(), "rentner" | "rentnerin"),
    );
    slots.check("MZ1.3-CB_PersAngErwerbArbeitslos", employment == "arbeitslos");
    slots.check(
        "MZ1.3-CB_PersAngErwerbNichterwerbsperson",
        employment == "nichterwerbsperson",
    );
}

fn address(slots: &mut Slots, client: &Client) {
    slots.text("MZ1.3-ET_WohnungAnschriftStraße", client.street.clone());
    slots.text(
        "MZ1.3-ET_WohnungAnschriftHausnummer",
        client.house_number.clone(),
    );
    slots.text(
        "MZ1.3-ET_WohnungAnschriftPostleitzahl",
        client.postal_code.clone(),
    );
    slots.text("MZ1.3-ET_WohnungAnschriftWohnort", client.city.clone());
}

fn housing(slots: &mut Slots, client: &Client) {
    slots.text("MZ1.3-ET_MieteGrößeWohnung", client.living_area_sqm.map(money));
    slots.text(
        "MZ1.3-DA_WohnungZKAnschriftEinzugsdatum",
        client
            .moved_in_on
            .map(|date| date.format("%d.%m.%Y").to_string()),
    );

    let tenancy = normalize_answer(client.tenancy.as_deref());
    slots.check("MZ1.3-CB_IchBinHauptmieter", tenancy == "hauptmieter");
    slots.check("MZ1.3-CB_IchBinUntermieter", tenancy == "untermieter");
    slots.check("MZ1.3-CB_IchBinHeimbewohner", tenancy == "heimbewohner");
    slots.check(
        "MZ1.3-CB_IchBinBewohnerMehr",
        matches!(tenancy.as_str(), "eigentum" | "eigentuemer"),
    );

    slots.yes_no(
        "MZ1.3-CB_IchBinVerwandtVerNein",
        "MZ1.3-CB_IIchBinVerwandtVerJa",
        client.related_to_landlord == Some(true),
    );
    slots.yes_no(
        "MZ1.3-CB_WohnungGefördertNein",
        "MZ1.3-CB_WohnungGefördertJa",
        client.rent_controlled == Some(true),
    );
}

fn rent(slots: &mut Slots, client: &Client) {
    slots.text("MZ1.3-ET_MieteGesamt", client.total_rent.map(money));

    let heating_included = client.heating_included == Some(true);
    let heating_separate = !heating_included && client.heating_cost.is_some_and(|cost| cost > 0.0);
    slots.check(
        "MZ1.3-CB_MonatMieteHeizkostemNein",
        !heating_included && !heating_separate,
    );
    slots.check("MZ1.3-CB_MonatMieteHeizkostemJa", heating_included);
    slots.check("MZ1.3-CB_MonatMieteHeizkostemJaGesond", heating_separate);
    if heating_separate {
        slots.text(
            "MZ1.3-ET_MonatMieteHeizkostemBetrag",
            client.heating_cost.map(money),
        );
    }

    let water_included = client.hot_water_included == Some(true);
    let water_separate = !water_included && client.hot_water_cost.is_some_and(|cost| cost > 0.0);
    slots.check(
        "MZ1.3-CB_MonatMieteWarmwasserNein",
        !water_included && !water_separate,
    );
    slots.check("MZ1.3-CB_MonatMieteWarmwasserJa", water_included);
    slots.check("MZ1.3-CB_MonatMieteWarmwasserJaGesond", water_separate);
    if water_separate {
        slots.text(
            "MZ1.3-ET_MonatMieteWarmwasserBetrag",
            client.hot_water_cost.map(money),
        );
    }

    for extra in ["Garage", "Service", "Haushaltsenergie"] {
        slots.check(&format!("MZ1.3-CB_MonatMiete{extra}Nein"), true);
        slots.check(&format!("MZ1.3-CB_MonatMiete{extra}Ja"), false);
        slots.check(&format!("MZ1.3-CB_MonatMiete{extra}JaGesond"), false);
    }
}

fn income(slots: &mut Slots, client: &Client) {
    slots.text("MZ1.3-ET_EinnahmeHHM1Familienname", client.last_name.clone());
    slots.text("MZ1.3-ET_EinnahmeHHM1Vorname", client.first_name.clone());

    if let Some(gross) = client.gross_income {
        let kind = client
            .income_type
            .clone()
            .unwrap_or_else(|| "Einkommen".to_string());
        slots.text("MZ1.3-ET_EinnahmeHHM1Art1", kind);
        slots.text("MZ1.3-ET_EinnahmeHHM1Art1Brutto", money(gross));
        slots.text(
            "MZ1.3-ET_EinnahmeHHM1Art1Turnus",
            frequency(client.income_frequency.as_deref()).to_string(),
        );
    }

    slots.check(
        "MZ1.3-CB_EinnahmeHHM1KV",
        client.pays_health_care_insurance == Some(true),
    );
}

fn payout(slots: &mut Slots, client: &Client) {
    let Some(iban) = client.iban.as_deref() else {
        return;
    };

    slots.check("MZ1.3-CB_ZahlungAnMich", true);
    slots.check("MZ1.3-CB_AuszahlungHHM", false);

    let compact = iban.chars().filter(|c| !c.is_whitespace());
    for (index, c) in compact.take(MAX_IBAN_SLOTS).enumerate() {
        slots.text(&format!("MZ1.3-AN_IBAN{}", index + 1), c.to_string());
    }

    slots.text("MZ1.3-ET_AuszahlungNameBank", client.bank_name.clone());

    let holder = client
        .account_holder
        .clone()
        .unwrap_or_else(|| client.full_name());
    slots.text("MZ1.3-ET_AuszahlungFamilienname", client.last_name.clone());
    slots.text("MZ1.3-ET_AuszahlungVorname", client.first_name.clone());
    slots.text("MZ1.3-ET_AuszahlungKontoinhaber", holder);

    let holder_address = client.account_holder_address.clone().unwrap_or_else(|| {
        format!(
            "{} {}, {} {}",
            client.street, client.house_number, client.postal_code, client.city
        )
    });
    slots.text("MZ1.3-ET_AuszahlungAnschrift", holder_address);
}

/// Questions the casework office answers with "Nein" unless the record says otherwise.
fn standard_answers(slots: &mut Slots, client: &Client) {
    const DEFAULT_NO: [&str; 14] = [
        "MZ1.3-CB_WohnungAndereWohnung",
        "MZ1.3-CB_WohnungZweitwohnsitz",
        "MZ1.3-CB_VerändHHMTod",
        "MZ1.3-CB_VerändHHMVerstorben",
        "MZ1.3-CB_VerändHHMAnzahl",
        "MZ1.3-CB_TransfLeistung",
        "MZ1.3-CB_TransfWohngeldBeantragen",
        "MZ1.3-CB_FreiBWerb",
        "MZ1.3-CB_FreiBKinderbetreu",
        "MZ1.3-CB_FreiBUnterh",
        "MZ1.3-CB_SonstEinUnterh",
        "MZ1.3-CB_SonstEinEinm",
        "MZ1.3-CB_DrittStaatKostentragen",
        "MZ1.3-CB_WeiterePersonen",
    ];
    for question in DEFAULT_NO {
        slots.yes_no(&format!("{question}Nein"), &format!("{question}Ja"), false);
    }

    slots.yes_no(
        "MZ1.3-CB_FreiBSchwerBeNein",
        "MZ1.3-CB_FreiBSchwerBeJa",
        client.disability_or_care == Some(true),
    );

    slots.check("MZ1.3-CB_MieteVerändNein", true);
    slots.check("MZ1.3-CB_MieteDritteNein", true);
    slots.check("MZ1.3-CB_MieteAnderePersNein", true);
    slots.check("MZ1.3-CB_SonstEinErhNein", true);
    slots.check("MZ1.3-CB_SonstEinVermögenNein", true);
    slots.check("MZ1.3-CB_HinweisAbfrage", true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casework::domain::ClientId;

    #[test]
    fn slot_names_fold_umlauts_and_strip_punctuation() {
        assert_eq!(
            normalize_slot_name("MZ1.3-ET_PersAngStaatsangehörigkeit"),
            "MZ13-ET_PersAngStaatsangehoerigkeit"
        );
        assert_eq!(
            normalize_slot_name("MZ1.3-ET_WohnungAnschriftStraße"),
            "MZ13-ET_WohnungAnschriftStrasse"
        );
    }

    #[test]
    fn continuation_carries_benefit_number_and_first_application_does_not() {
        let mut client = Client::new(ClientId(1), "Beispiel", "Maria");
        client.benefit_number = Some("WG-2024-0815".to_string());

        let renewal = FormFieldMapper.map(&client, DeadlineKind::Renewal);
        assert_eq!(
            renewal.get("MZ1.3-MTF_AllgWoGNR_AKZ"),
            Some(&FormValue::Text("WG-2024-0815".to_string()))
        );
        assert_eq!(
            renewal.get("MZ1.3-CB_AllgAntragstyp_Weiterleistungsantrag"),
            Some(&FormValue::Checkbox(true))
        );

        let first = FormFieldMapper.map(&client, DeadlineKind::FirstApplication);
        assert!(!first.contains_key("MZ1.3-MTF_AllgWoGNR_AKZ"));
        assert_eq!(
            first.get("MZ1.3-CB_AllgAntragstyp_Erstantrag"),
            Some(&FormValue::Checkbox(true))
        );
    }

    #[test]
    fn iban_is_split_into_character_slots_and_money_uses_decimal_comma() {
        let mut client = Client::new(ClientId(1), "Beispiel", "Maria");
        client.iban = Some("DE89 37".to_string());
        client.total_rent = Some(463.5);
        client.gender = Some("Männlich".to_string());

        let slots = FormFieldMapper.map(&client, DeadlineKind::FirstApplication);
        assert_eq!(
            slots.get("MZ1.3-AN_IBAN1"),
            Some(&FormValue::Text("D".to_string()))
        );
        assert_eq!(
            slots.get("MZ1.3-AN_IBAN6"),
            Some(&FormValue::Text("7".to_string()))
        );
        assert!(!slots.contains_key("MZ1.3-AN_IBAN7"));
        assert_eq!(
            slots.get("MZ1.3-ET_MieteGesamt"),
            Some(&FormValue::Text("463,50".to_string()))
        );
        assert_eq!(
            slots.get("MZ1.3-CB_PersAngGeschlechtMännlich"),
            Some(&FormValue::Checkbox(true))
        );
    }

    #[test]
    fn known_slots_cover_conditional_and_continuation_slots() {
        let known = FormFieldMapper.known_slots();

        assert!(known.contains("MZ13-MTF_AllgWoGNR_AKZ"));
        assert!(known.contains("MZ13-ET_MonatMieteHeizkostemBetrag"));
        assert!(known.contains("MZ13-ET_PersAngStaatsangehoerigkeit"));
        assert!(known.contains("MZ13-AN_IBAN33"));
        assert!(!known.contains("MZ13-AN_IBAN34"));
        assert!(!known.contains("MZ13-ET_KindergeldBetrag"));
    }
}
