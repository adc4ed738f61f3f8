//! Typed notice templates.
//!
//! Placeholders (`{{building_name}}`) are checked against a closed set of
//! variables when a template is registered, so a broadcast can never reach
//! the delivery collaborator carrying apartment-level figures.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::domain::{ApartmentId, Building, BuildingId};
use super::statement::ChargesStatement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Building,
    Apartment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariable {
    BuildingName,
    PeriodStart,
    PeriodEnd,
    GrandTotal,
    ReserveFundTarget,
    ApartmentNumber,
    TotalDue,
    AmountOutstanding,
    HeatingCharge,
    ReserveContribution,
}

impl TemplateVariable {
    pub const ALL: [Self; 10] = [
        Self::BuildingName,
        Self::PeriodStart,
        Self::PeriodEnd,
        Self::GrandTotal,
        Self::ReserveFundTarget,
        Self::ApartmentNumber,
        Self::TotalDue,
        Self::AmountOutstanding,
        Self::HeatingCharge,
        Self::ReserveContribution,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::BuildingName => "building_name",
            Self::PeriodStart => "period_start",
            Self::PeriodEnd => "period_end",
            Self::GrandTotal => "grand_total",
            Self::ReserveFundTarget => "reserve_fund_target",
            Self::ApartmentNumber => "apartment_number",
            Self::TotalDue => "total_due",
            Self::AmountOutstanding => "amount_outstanding",
            Self::HeatingCharge => "heating_charge",
            Self::ReserveContribution => "reserve_contribution",
        }
    }

    pub const fn scope(self) -> VariableScope {
        match self {
            Self::BuildingName
            | Self::PeriodStart
            | Self::PeriodEnd
            | Self::GrandTotal
            | Self::ReserveFundTarget => VariableScope::Building,
            Self::ApartmentNumber
            | Self::TotalDue
            | Self::AmountOutstanding
            | Self::HeatingCharge
            | Self::ReserveContribution => VariableScope::Apartment,
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL.into_iter().find(|variable| variable.key() == key)
    }
}

/// Who a notice is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeAudience {
    Apartment,
    Building,
    MultiBuilding,
}

impl NoticeAudience {
    pub const fn allows(self, scope: VariableScope) -> bool {
        match scope {
            VariableScope::Building => true,
            VariableScope::Apartment => matches!(self, Self::Apartment),
        }
    }
}

impl fmt::Display for NoticeAudience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Apartment => "apartment",
            Self::Building => "building",
            Self::MultiBuilding => "multi_building",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template `{template}` references unknown variable `{key}`")]
    UnknownVariable { template: String, key: String },
    #[error("template `{template}` uses apartment variable `{key}` in a {audience} notice")]
    ScopeViolation {
        template: String,
        key: &'static str,
        audience: NoticeAudience,
    },
    #[error("template `{template}` has an unterminated placeholder at byte {offset}")]
    Unterminated { template: String, offset: usize },
    #[error("template `{template}` is addressed to apartments and needs a recipient")]
    MissingRecipient { template: String },
    #[error("template `{template}` cannot be bound for a single apartment")]
    UnexpectedRecipient { template: String },
    #[error("apartment {0} has no charges in this statement")]
    UnknownApartment(ApartmentId),
}

/// A template whose placeholders were validated at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeTemplate {
    name: String,
    audience: NoticeAudience,
    body: String,
    variables: BTreeSet<TemplateVariable>,
}

impl NoticeTemplate {
    pub fn register(
        name: impl Into<String>,
        audience: NoticeAudience,
        body: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        let body = body.into();

        let mut variables = BTreeSet::new();
        for key in placeholders(&name, &body)? {
            let variable =
                TemplateVariable::parse(key).ok_or_else(|| TemplateError::UnknownVariable {
                    template: name.clone(),
                    key: key.trim().to_string(),
                })?;
            if !audience.allows(variable.scope()) {
                return Err(TemplateError::ScopeViolation {
                    template: name,
                    key: variable.key(),
                    audience,
                });
            }
            variables.insert(variable);
        }

        Ok(Self {
            name,
            audience,
            body,
            variables,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn audience(&self) -> NoticeAudience {
        self.audience
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn variables(&self) -> impl Iterator<Item = TemplateVariable> + '_ {
        self.variables.iter().copied()
    }

    /// Collects the values this template references from a calculated statement.
    ///
    /// Apartment notices need a recipient; building and broadcast notices must not have one.
    pub fn bind(
        &self,
        context: &NoticeContext,
        recipient: Option<ApartmentId>,
    ) -> Result<BoundNotice, TemplateError> {
        let apartment_values = match (self.audience, recipient) {
            (NoticeAudience::Apartment, Some(id)) => Some(
                context
                    .apartments
                    .get(&id)
                    .ok_or(TemplateError::UnknownApartment(id))?,
            ),
            (NoticeAudience::Apartment, None) => {
                return Err(TemplateError::MissingRecipient {
                    template: self.name.clone(),
                })
            }
            (_, Some(_)) => {
                return Err(TemplateError::UnexpectedRecipient {
                    template: self.name.clone(),
                })
            }
            (_, None) => None,
        };

        let values = self
            .variables
            .iter()
            .filter_map(|variable| {
                let value = match variable.scope() {
                    VariableScope::Building => context.building.get(variable),
                    VariableScope::Apartment => {
                        apartment_values.and_then(|values| values.get(variable))
                    }
                };
                value.map(|value| (variable.key(), value.clone()))
            })
            .collect();

        Ok(BoundNotice {
            template: self.name.clone(),
            building_id: context.building_id,
            apartment_id: recipient,
            values,
        })
    }
}

/// Values a notice may reference, taken from one calculated statement.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeContext {
    building_id: BuildingId,
    building: BTreeMap<TemplateVariable, String>,
    apartments: BTreeMap<ApartmentId, BTreeMap<TemplateVariable, String>>,
}

impl NoticeContext {
    pub fn from_statement(building: &Building, statement: &ChargesStatement) -> Self {
        let mut building_values = BTreeMap::new();
        building_values.insert(TemplateVariable::BuildingName, building.name.clone());
        building_values.insert(
            TemplateVariable::PeriodStart,
            statement.period.start.to_string(),
        );
        building_values.insert(TemplateVariable::PeriodEnd, statement.period.end.to_string());
        building_values.insert(
            TemplateVariable::GrandTotal,
            statement.totals.grand_total.to_string(),
        );
        building_values.insert(
            TemplateVariable::ReserveFundTarget,
            statement.reserve_fund.period_target.to_string(),
        );

        let apartments = statement
            .shares
            .iter()
            .map(|(id, share)| {
                let mut values = BTreeMap::new();
                values.insert(TemplateVariable::ApartmentNumber, share.apartment_number.clone());
                values.insert(TemplateVariable::TotalDue, share.total_due.to_string());
                values.insert(
                    TemplateVariable::AmountOutstanding,
                    share.total_amount.to_string(),
                );
                values.insert(
                    TemplateVariable::HeatingCharge,
                    share.breakdown.heating().to_string(),
                );
                values.insert(
                    TemplateVariable::ReserveContribution,
                    share.breakdown.reserve_fund_contribution.to_string(),
                );
                (*id, values)
            })
            .collect();

        Self {
            building_id: statement.building_id,
            building: building_values,
            apartments,
        }
    }

    pub fn building_id(&self) -> BuildingId {
        self.building_id
    }

    pub fn apartment_ids(&self) -> impl Iterator<Item = ApartmentId> + '_ {
        self.apartments.keys().copied()
    }
}

/// Validated payload handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundNotice {
    pub template: String,
    pub building_id: BuildingId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apartment_id: Option<ApartmentId>,
    pub values: BTreeMap<&'static str, String>,
}

fn placeholders<'a>(template: &str, body: &'a str) -> Result<Vec<&'a str>, TemplateError> {
    let mut keys = Vec::new();
    let mut cursor = 0;
    while let Some(open) = body[cursor..].find("{{") {
        let start = cursor + open + 2;
        let close = body[start..]
            .find("}}")
            .ok_or_else(|| TemplateError::Unterminated {
                template: template.to_string(),
                offset: cursor + open,
            })?;
        keys.push(&body[start..start + close]);
        cursor = start + close + 2;
    }
    Ok(keys)
}
