use crate::process::ProcessModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Which values an element passes on to its consumers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deploy {
    /// Outputs simulated in the current step
    #[default]
    NewSim,
    /// Observed values from the input source
    ///
    /// The element is still simulated and sinks record the simulated outputs, which can
    /// then be compared with the observations.
    Obs,
    /// Values of an earlier simulation read from the input source
    ///
    /// The external values replace the element's own outputs, for consumers and sinks alike.
    OldSim,
}

impl Deploy {
    /// Whether consumers receive values from the input source
    pub fn is_external(&self) -> bool {
        !matches!(self, Deploy::NewSim)
    }
}

impl Display for Deploy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            Deploy::NewSim => "newsim",
            Deploy::Obs => "obs",
            Deploy::OldSim => "oldsim",
        };
        write!(f, "{}", mode)
    }
}

/// A named node of the network bound to a process model
///
/// Elements are immutable once the network is built. Their state is owned by the
/// simulation run rather than the element itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    name: String,
    model: Arc<dyn ProcessModel>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "is_newsim")]
    deploy: Deploy,
}

fn is_newsim(deploy: &Deploy) -> bool {
    *deploy == Deploy::NewSim
}

impl Element {
    pub fn new(name: &str, model: Arc<dyn ProcessModel>) -> Self {
        Self {
            name: name.to_string(),
            model,
            keywords: BTreeSet::new(),
            deploy: Deploy::default(),
        }
    }

    pub fn with_deploy(self, deploy: Deploy) -> Self {
        Self { deploy, ..self }
    }

    /// Tag the element so that it can be selected with [`crate::network::Network::select`]
    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keywords.insert(keyword.to_string());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &dyn ProcessModel {
        self.model.as_ref()
    }

    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn deploy(&self) -> Deploy {
        self.deploy
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
