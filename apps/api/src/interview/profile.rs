//! Candidate profile — seven free-text fields collected before the interview starts.

use serde::{Deserialize, Serialize};

/// Immutable once accepted. Every field is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub age: String,
    pub current_industry: String,
    pub current_role: String,
    /// Position level in the current job, e.g. member / lead / manager.
    pub current_title: String,
    pub years_experience: String,
    pub target_industry: String,
    pub target_role: String,
}

/// Raw form input. Fields the client omits stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    pub age: Option<String>,
    pub current_industry: Option<String>,
    pub current_role: Option<String>,
    pub current_title: Option<String>,
    pub years_experience: Option<String>,
    pub target_industry: Option<String>,
    pub target_role: Option<String>,
}

/// Names of the fields that were absent or blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingProfileFields(pub Vec<&'static str>);

impl std::fmt::Display for MissingProfileFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "missing profile fields: {}", self.0.join(", "))
    }
}

impl ProfileForm {
    /// Validates the form into a `Profile`.
    ///
    /// When `fallback` is given (a restart that kept the previous profile),
    /// absent or blank fields are taken from it instead of being reported.
    pub fn into_profile(self, fallback: Option<&Profile>) -> Result<Profile, MissingProfileFields> {
        let mut missing = Vec::new();

        let mut take = |name: &'static str, value: Option<String>, kept: Option<&String>| {
            match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => match kept {
                    Some(k) => k.clone(),
                    None => {
                        missing.push(name);
                        String::new()
                    }
                },
            }
        };

        let profile = Profile {
            age: take("age", self.age, fallback.map(|p| &p.age)),
            current_industry: take(
                "current_industry",
                self.current_industry,
                fallback.map(|p| &p.current_industry),
            ),
            current_role: take(
                "current_role",
                self.current_role,
                fallback.map(|p| &p.current_role),
            ),
            current_title: take(
                "current_title",
                self.current_title,
                fallback.map(|p| &p.current_title),
            ),
            years_experience: take(
                "years_experience",
                self.years_experience,
                fallback.map(|p| &p.years_experience),
            ),
            target_industry: take(
                "target_industry",
                self.target_industry,
                fallback.map(|p| &p.target_industry),
            ),
            target_role: take(
                "target_role",
                self.target_role,
                fallback.map(|p| &p.target_role),
            ),
        };

        if missing.is_empty() {
            Ok(profile)
        } else {
            Err(MissingProfileFields(missing))
        }
    }
}

impl Profile {
    /// True when no field is blank. Used to check imported snapshots.
    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, v)| !v.trim().is_empty())
    }

    /// Placeholder name → value pairs consumed by the rules template.
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("age", self.age.as_str()),
            ("current_industry", self.current_industry.as_str()),
            ("current_role", self.current_role.as_str()),
            ("current_title", self.current_title.as_str()),
            ("years_experience", self.years_experience.as_str()),
            ("target_industry", self.target_industry.as_str()),
            ("target_role", self.target_role.as_str()),
        ]
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> Profile {
    Profile {
        age: "30".to_string(),
        current_industry: "IT".to_string(),
        current_role: "エンジニア".to_string(),
        current_title: "リーダー".to_string(),
        years_experience: "5年".to_string(),
        target_industry: "コンサルティング".to_string(),
        target_role: "データサイエンティスト".to_string(),
    }
}
