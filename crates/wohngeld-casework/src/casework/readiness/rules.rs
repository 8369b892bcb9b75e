use std::collections::BTreeMap;

use super::super::domain::{Client, DeadlineKind};

/// Client attributes that readiness rules can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClientField {
    LastName,
    FirstName,
    BirthDate,
    Nationality,
    MaritalStatus,
    Street,
    HouseNumber,
    PostalCode,
    City,
    Phone,
    LivingArea,
    Tenancy,
    MovedInOn,
    LandlordName,
    TotalRent,
    HeatingCost,
    IncomeType,
    GrossIncome,
    IncomeFrequency,
    Iban,
    BankName,
    AccountHolder,
    CareLevel,
    BenefitNumber,
}

fn has_text(value: &str) -> bool {
    !value.trim().is_empty()
}

fn has_optional_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(has_text)
}

fn has_amount(value: Option<f64>) -> bool {
    value.is_some_and(|amount| amount.is_finite() && amount > 0.0)
}

impl ClientField {
    /// Whether the client carries a usable value for this attribute.
    pub fn is_filled(self, client: &Client) -> bool {
        match self {
            Self::LastName => has_text(&client.last_name),
            Self::FirstName => has_text(&client.first_name),
            Self::BirthDate => client.birth_date.is_some(),
            Self::Nationality => has_optional_text(&client.nationality),
            Self::MaritalStatus => has_optional_text(&client.marital_status),
            Self::Street => has_text(&client.street),
            Self::HouseNumber => has_text(&client.house_number),
            Self::PostalCode => has_text(&client.postal_code),
            Self::City => has_text(&client.city),
            Self::Phone => has_optional_text(&client.phone),
            Self::LivingArea => has_amount(client.living_area_sqm),
            Self::Tenancy => has_optional_text(&client.tenancy),
            Self::MovedInOn => client.moved_in_on.is_some(),
            Self::LandlordName => has_optional_text(&client.landlord_name),
            Self::TotalRent => has_amount(client.total_rent),
            Self::HeatingCost => has_amount(client.heating_cost),
            Self::IncomeType => has_optional_text(&client.income_type),
            // Zero income is a legitimate declaration.
            Self::GrossIncome => client
                .gross_income
                .is_some_and(|amount| amount.is_finite() && amount >= 0.0),
            Self::IncomeFrequency => has_optional_text(&client.income_frequency),
            Self::Iban => has_optional_text(&client.iban),
            Self::BankName => has_optional_text(&client.bank_name),
            Self::AccountHolder => has_optional_text(&client.account_holder),
            Self::CareLevel => has_optional_text(&client.care_level),
            Self::BenefitNumber => has_optional_text(&client.benefit_number),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::LastName => "Familienname",
            Self::FirstName => "Vorname",
            Self::BirthDate => "Geburtsdatum",
            Self::Nationality => "Staatsangehörigkeit",
            Self::MaritalStatus => "Familienstand",
            Self::Street => "Straße",
            Self::HouseNumber => "Hausnummer",
            Self::PostalCode => "PLZ",
            Self::City => "Ort",
            Self::Phone => "Telefon",
            Self::LivingArea => "Wohnfläche",
            Self::Tenancy => "Wohnverhältnis",
            Self::MovedInOn => "Einzugsdatum",
            Self::LandlordName => "Name des Vermieters",
            Self::TotalRent => "Gesamtmiete",
            Self::HeatingCost => "Heizkosten",
            Self::IncomeType => "Einkommensart",
            Self::GrossIncome => "Bruttoeinkommen",
            Self::IncomeFrequency => "Einkommensturnus",
            Self::Iban => "IBAN",
            Self::BankName => "Name der Bank",
            Self::AccountHolder => "Kontoinhaber",
            Self::CareLevel => "Pflegegrad",
            Self::BenefitNumber => "Wohngeldnummer",
        }
    }
}

/// When a rule's field has to be present.
#[derive(Clone, Copy)]
pub enum Requirement {
    Always,
    /// Missing values only raise a warning.
    Recommended,
    /// Required when the predicate holds for the client.
    When(fn(&Client) -> bool),
}

impl std::fmt::Debug for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Recommended => f.write_str("Recommended"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: ClientField,
    pub requirement: Requirement,
}

impl FieldRule {
    pub const fn always(field: ClientField) -> Self {
        Self {
            field,
            requirement: Requirement::Always,
        }
    }

    pub const fn recommended(field: ClientField) -> Self {
        Self {
            field,
            requirement: Requirement::Recommended,
        }
    }

    pub const fn when(field: ClientField, predicate: fn(&Client) -> bool) -> Self {
        Self {
            field,
            requirement: Requirement::When(predicate),
        }
    }

    pub fn is_required_for(&self, client: &Client) -> bool {
        match self.requirement {
            Requirement::Always => true,
            Requirement::Recommended => false,
            Requirement::When(predicate) => predicate(client),
        }
    }

    pub fn is_recommended(&self) -> bool {
        matches!(self.requirement, Requirement::Recommended)
    }
}

fn heating_billed_separately(client: &Client) -> bool {
    client.heating_included != Some(true)
}

fn claims_disability_or_care(client: &Client) -> bool {
    client.disability_or_care == Some(true)
}

const IDENTITY_AND_ADDRESS: [FieldRule; 6] = [
    FieldRule::always(ClientField::LastName),
    FieldRule::always(ClientField::FirstName),
    FieldRule::always(ClientField::Street),
    FieldRule::always(ClientField::HouseNumber),
    FieldRule::always(ClientField::PostalCode),
    FieldRule::always(ClientField::City),
];

const FIRST_APPLICATION: [FieldRule; 18] = [
    FieldRule::always(ClientField::BirthDate),
    FieldRule::always(ClientField::Nationality),
    FieldRule::always(ClientField::MaritalStatus),
    FieldRule::always(ClientField::Tenancy),
    FieldRule::always(ClientField::LivingArea),
    FieldRule::always(ClientField::TotalRent),
    FieldRule::when(ClientField::HeatingCost, heating_billed_separately),
    FieldRule::always(ClientField::IncomeType),
    FieldRule::always(ClientField::GrossIncome),
    FieldRule::always(ClientField::IncomeFrequency),
    FieldRule::always(ClientField::Iban),
    FieldRule::always(ClientField::AccountHolder),
    FieldRule::when(ClientField::CareLevel, claims_disability_or_care),
    FieldRule::recommended(ClientField::Phone),
    FieldRule::recommended(ClientField::MovedInOn),
    FieldRule::recommended(ClientField::LandlordName),
    FieldRule::recommended(ClientField::BankName),
    FieldRule::recommended(ClientField::BenefitNumber),
];

const RENEWAL: [FieldRule; 12] = [
    FieldRule::always(ClientField::BirthDate),
    FieldRule::always(ClientField::BenefitNumber),
    FieldRule::always(ClientField::TotalRent),
    FieldRule::when(ClientField::HeatingCost, heating_billed_separately),
    FieldRule::always(ClientField::IncomeType),
    FieldRule::always(ClientField::GrossIncome),
    FieldRule::always(ClientField::IncomeFrequency),
    FieldRule::always(ClientField::Iban),
    FieldRule::always(ClientField::AccountHolder),
    FieldRule::when(ClientField::CareLevel, claims_disability_or_care),
    FieldRule::recommended(ClientField::LivingArea),
    FieldRule::recommended(ClientField::Phone),
];

const INCREASE: [FieldRule; 8] = [
    FieldRule::always(ClientField::BenefitNumber),
    FieldRule::always(ClientField::TotalRent),
    FieldRule::when(ClientField::HeatingCost, heating_billed_separately),
    FieldRule::always(ClientField::GrossIncome),
    FieldRule::always(ClientField::IncomeFrequency),
    FieldRule::when(ClientField::CareLevel, claims_disability_or_care),
    FieldRule::recommended(ClientField::IncomeType),
    FieldRule::recommended(ClientField::Iban),
];

const DOCUMENT_RESUBMISSION: [FieldRule; 1] = [FieldRule::recommended(ClientField::BenefitNumber)];

/// Ordered field rules per document type.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: BTreeMap<DeadlineKind, Vec<FieldRule>>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Append rules for a kind; existing rules for the same field are replaced.
    pub fn with_rules(
        mut self,
        kind: DeadlineKind,
        rules: impl IntoIterator<Item = FieldRule>,
    ) -> Self {
        let entry = self.rules.entry(kind).or_default();
        for rule in rules {
            entry.retain(|existing| existing.field != rule.field);
            entry.push(rule);
        }
        self
    }

    /// Housing-benefit requirements as applied by the casework office.
    pub fn standard() -> Self {
        let identity = IDENTITY_AND_ADDRESS;
        Self::empty()
            .with_rules(DeadlineKind::FirstApplication, identity)
            .with_rules(DeadlineKind::FirstApplication, FIRST_APPLICATION)
            .with_rules(DeadlineKind::Renewal, identity)
            .with_rules(DeadlineKind::Renewal, RENEWAL)
            .with_rules(DeadlineKind::Increase, identity)
            .with_rules(DeadlineKind::Increase, INCREASE)
            .with_rules(DeadlineKind::DocumentResubmission, identity)
            .with_rules(DeadlineKind::DocumentResubmission, DOCUMENT_RESUBMISSION)
            .with_rules(DeadlineKind::Other, identity)
    }

    pub fn rules_for(&self, kind: DeadlineKind) -> &[FieldRule] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields that must be present for `client` to be ready for `kind`, in rule order.
    pub fn required_fields(&self, kind: DeadlineKind, client: &Client) -> Vec<ClientField> {
        self.rules_for(kind)
            .iter()
            .filter(|rule| rule.is_required_for(client))
            .map(|rule| rule.field)
            .collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casework::domain::ClientId;

    #[test]
    fn bank_details_are_not_required_for_document_resubmission() {
        let rules = RuleSet::standard();
        let client = Client::new(ClientId(1), "Beispiel", "Maria");

        let first = rules.required_fields(DeadlineKind::FirstApplication, &client);
        let resubmission = rules.required_fields(DeadlineKind::DocumentResubmission, &client);

        assert!(first.contains(&ClientField::Iban));
        assert!(!resubmission.contains(&ClientField::Iban));
        assert!(rules
            .required_fields(DeadlineKind::Renewal, &client)
            .contains(&ClientField::BenefitNumber));
    }

    #[test]
    fn conditional_rules_follow_client_attributes() {
        let rules = RuleSet::standard();
        let mut client = Client::new(ClientId(1), "Beispiel", "Maria");
        client.heating_included = Some(true);

        let fields = rules.required_fields(DeadlineKind::Increase, &client);
        assert!(!fields.contains(&ClientField::HeatingCost));
        assert!(!fields.contains(&ClientField::CareLevel));

        client.heating_included = Some(false);
        client.disability_or_care = Some(true);
        let fields = rules.required_fields(DeadlineKind::Increase, &client);
        assert!(fields.contains(&ClientField::HeatingCost));
        assert!(fields.contains(&ClientField::CareLevel));
    }

    #[test]
    fn later_rules_replace_earlier_ones_for_the_same_field() {
        let rules = RuleSet::empty()
            .with_rules(DeadlineKind::Other, [FieldRule::always(ClientField::Iban)])
            .with_rules(DeadlineKind::Other, [FieldRule::recommended(ClientField::Iban)]);

        assert_eq!(rules.rules_for(DeadlineKind::Other).len(), 1);
        assert!(rules
            .required_fields(DeadlineKind::Other, &Client::default())
            .is_empty());
    }
}
