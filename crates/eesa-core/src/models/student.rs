//! Student academic records and cohorts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::{Auditable, ObjectRef};
use super::permission::ResourceType;
use crate::authz::{Owned, Ownership};
use crate::error::{EesaError, EesaResult};

/// A student's admission batch: `(scheme, year_of_joining)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cohort {
    pub scheme: u16,
    pub year_of_joining: u16,
}

impl Cohort {
    pub fn new(scheme: u16, year_of_joining: u16) -> Self {
        Self {
            scheme,
            year_of_joining,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scheme {} / joined {}", self.scheme, self.year_of_joining)
    }
}

/// Year of study for a semester: 1-2 -> 1, 3-4 -> 2, 5-6 -> 3, 7-8 -> 4.
pub fn year_of_study(semester: u8) -> EesaResult<u8> {
    if !(1..=8).contains(&semester) {
        return Err(EesaError::validation(
            "ongoing_semester",
            "must be between 1 and 8",
        ));
    }
    Ok(semester.div_ceil(2))
}

/// Academic record attached one-to-one to a student user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub user_id: Uuid,
    pub full_name: String,
    pub scheme: u16,
    pub year_of_joining: u16,
    pub expected_year_of_passout: u16,
    pub ongoing_semester: u8,
    /// Derived from `ongoing_semester`, never set directly.
    pub year_of_study: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn cohort(&self) -> Cohort {
        Cohort::new(self.scheme, self.year_of_joining)
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (S{} - Y{})",
            self.full_name, self.scheme, self.year_of_study
        )
    }
}

impl Owned for Student {
    fn ownership(&self) -> Ownership {
        Ownership {
            user: Some(self.user_id),
            ..Ownership::default()
        }
    }
}

impl Auditable for Student {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceType::Student, self.user_id)
    }

    fn object_repr(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudent {
    pub user_id: Uuid,
    pub full_name: String,
    pub scheme: u16,
    pub year_of_joining: u16,
    pub expected_year_of_passout: u16,
    pub ongoing_semester: u8,
}

impl CreateStudent {
    pub fn into_student(self) -> EesaResult<Student> {
        if self.full_name.trim().is_empty() {
            return Err(EesaError::validation("full_name", "must not be empty"));
        }
        if self.expected_year_of_passout < self.year_of_joining {
            return Err(EesaError::validation(
                "expected_year_of_passout",
                "cannot precede the year of joining",
            ));
        }
        let now = Utc::now();
        Ok(Student {
            user_id: self.user_id,
            full_name: self.full_name,
            scheme: self.scheme,
            year_of_joining: self.year_of_joining,
            expected_year_of_passout: self.expected_year_of_passout,
            year_of_study: year_of_study(self.ongoing_semester)?,
            ongoing_semester: self.ongoing_semester,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStudent {
    pub full_name: Option<String>,
    pub expected_year_of_passout: Option<u16>,
    pub ongoing_semester: Option<u8>,
}

impl UpdateStudent {
    pub fn apply_to(&self, student: &mut Student) -> EesaResult<()> {
        if let Some(semester) = self.ongoing_semester {
            student.year_of_study = year_of_study(semester)?;
            student.ongoing_semester = semester;
        }
        if let Some(name) = &self.full_name {
            student.full_name = name.clone();
        }
        if let Some(year) = self.expected_year_of_passout {
            student.expected_year_of_passout = year;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_of_study_follows_semester_pairs() {
        let years: Vec<u8> = (1..=8).map(|s| year_of_study(s).unwrap()).collect();
        assert_eq!(years, vec![1, 1, 2, 2, 3, 3, 4, 4]);
        assert!(year_of_study(0).is_err());
        assert!(year_of_study(9).is_err());
    }

    #[test]
    fn update_recomputes_year_of_study() {
        let mut student = CreateStudent {
            user_id: Uuid::new_v4(),
            full_name: "Anjali R".into(),
            scheme: 2021,
            year_of_joining: 2021,
            expected_year_of_passout: 2025,
            ongoing_semester: 2,
        }
        .into_student()
        .unwrap();
        assert_eq!(student.year_of_study, 1);

        UpdateStudent {
            ongoing_semester: Some(5),
            ..UpdateStudent::default()
        }
        .apply_to(&mut student)
        .unwrap();
        assert_eq!(student.year_of_study, 3);
        assert_eq!(student.to_string(), "Anjali R (S2021 - Y3)");
    }

    #[test]
    fn invalid_semester_leaves_student_untouched() {
        let mut student = CreateStudent {
            user_id: Uuid::new_v4(),
            full_name: "Rahul K".into(),
            scheme: 2019,
            year_of_joining: 2020,
            expected_year_of_passout: 2024,
            ongoing_semester: 7,
        }
        .into_student()
        .unwrap();
        let update = UpdateStudent {
            ongoing_semester: Some(10),
            ..UpdateStudent::default()
        };
        assert!(update.apply_to(&mut student).is_err());
        assert_eq!(student.ongoing_semester, 7);
    }
}
