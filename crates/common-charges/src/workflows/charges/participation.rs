use std::collections::BTreeSet;

use rust_decimal::Decimal;

use super::domain::{AllocationError, Apartment, ApartmentId, BuildingId};

pub const MAX_PARTICIPATION_MILLS: i32 = 1000;

/// Validated view of one active apartment.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub apartment_id: ApartmentId,
    pub number: String,
    pub mills: u32,
    pub heating_eligible: bool,
    pub legacy_monthly_due: Option<Decimal>,
}

/// Active apartments of one building, ordered by id, with the live mills sums
/// computed once per request.
#[derive(Debug, Clone)]
pub struct ParticipationRoster {
    building_id: BuildingId,
    participants: Vec<Participant>,
    mills_total: u32,
    heating_mills_total: u32,
}

impl ParticipationRoster {
    pub fn from_apartments(
        building_id: BuildingId,
        apartments: &[Apartment],
    ) -> Result<Self, AllocationError> {
        let mut seen = BTreeSet::new();
        let mut participants = Vec::with_capacity(apartments.len());

        for apartment in apartments {
            if apartment.building_id != building_id || !apartment.active {
                continue;
            }

            let mills = apartment.participation_mills;
            if !(0..=MAX_PARTICIPATION_MILLS).contains(&mills) {
                return Err(AllocationError::input_range(
                    format!("apartments[{}].participation_mills", apartment.apartment_id),
                    format!("{mills} is outside 0..={MAX_PARTICIPATION_MILLS}"),
                ));
            }
            if !seen.insert(apartment.apartment_id) {
                return Err(AllocationError::input_range(
                    "apartments",
                    format!("apartment {} listed twice", apartment.apartment_id),
                ));
            }

            participants.push(Participant {
                apartment_id: apartment.apartment_id,
                number: apartment.number.clone(),
                mills: mills.unsigned_abs(),
                heating_eligible: apartment.heating_eligible,
                legacy_monthly_due: apartment.legacy_monthly_due,
            });
        }

        participants.sort_by_key(|participant| participant.apartment_id);

        let mills_total = participants.iter().map(|p| p.mills).sum();
        if mills_total == 0 {
            return Err(AllocationError::configuration(
                building_id,
                "participation_mills",
                "active apartments have a zero mills sum",
            ));
        }
        let heating_mills_total = participants
            .iter()
            .filter(|p| p.heating_eligible)
            .map(|p| p.mills)
            .sum();

        Ok(Self {
            building_id,
            participants,
            mills_total,
            heating_mills_total,
        })
    }

    pub fn building_id(&self) -> BuildingId {
        self.building_id
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, apartment_id: ApartmentId) -> Option<&Participant> {
        self.participants
            .binary_search_by_key(&apartment_id, |p| p.apartment_id)
            .ok()
            .map(|index| &self.participants[index])
    }

    pub fn ids(&self) -> impl Iterator<Item = ApartmentId> + '_ {
        self.participants.iter().map(|p| p.apartment_id)
    }

    pub fn mills_total(&self) -> u32 {
        self.mills_total
    }

    pub fn heating_mills_total(&self) -> u32 {
        self.heating_mills_total
    }

    pub fn mills(&self) -> impl Iterator<Item = (ApartmentId, u32)> + '_ {
        self.participants.iter().map(|p| (p.apartment_id, p.mills))
    }

    pub fn heating_mills(&self) -> impl Iterator<Item = (ApartmentId, u32)> + '_ {
        self.heating_participants()
            .map(|p| (p.apartment_id, p.mills))
    }

    pub fn heating_participants(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.participants.iter().filter(|p| p.heating_eligible)
    }

    /// One unit of weight per apartment.
    pub fn equal_weights(&self) -> impl Iterator<Item = (ApartmentId, u32)> + '_ {
        self.participants.iter().map(|p| (p.apartment_id, 1))
    }
}
