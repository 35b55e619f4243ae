//! Validated kubectl command builder.
//!
//! Every identifier that ends up in the command string passes the allow-list
//! in [`crate::validation`] first, so the assembled string is safe to hand to
//! [`crate::manager::ConnectionManager::run_structured`]. Free-form commands
//! bypass this builder and are the caller's responsibility.

use crate::validation::{ValidationError, validate_identifier};

/// Builder for the retrieval commands the dashboard issues.
#[derive(Debug, Clone)]
pub struct KubectlCommand {
    verb: &'static str,
    resource: String,
    name: Option<String>,
    namespace: Option<String>,
    all_namespaces: bool,
    container: Option<String>,
    tail: Option<u32>,
    json: bool,
}

impl KubectlCommand {
    fn new(verb: &'static str, resource: &str, json: bool) -> Result<Self, ValidationError> {
        validate_identifier("resource", resource)?;
        Ok(Self {
            verb,
            resource: resource.to_string(),
            name: None,
            namespace: None,
            all_namespaces: false,
            container: None,
            tail: None,
            json,
        })
    }

    /// `kubectl get <resource> -o json`
    pub fn get(resource: &str) -> Result<Self, ValidationError> {
        Self::new("get", resource, true)
    }

    /// `kubectl describe <resource>`
    pub fn describe(resource: &str) -> Result<Self, ValidationError> {
        Self::new("describe", resource, false)
    }

    /// `kubectl logs <pod>`
    pub fn logs(pod: &str) -> Result<Self, ValidationError> {
        Self::new("logs", pod, false)
    }

    pub fn name(mut self, name: &str) -> Result<Self, ValidationError> {
        validate_identifier("name", name)?;
        self.name = Some(name.to_string());
        Ok(self)
    }

    pub fn namespace(mut self, namespace: &str) -> Result<Self, ValidationError> {
        validate_identifier("namespace", namespace)?;
        self.namespace = Some(namespace.to_string());
        Ok(self)
    }

    pub fn all_namespaces(mut self) -> Self {
        self.all_namespaces = true;
        self
    }

    pub fn container(mut self, container: &str) -> Result<Self, ValidationError> {
        validate_identifier("container", container)?;
        self.container = Some(container.to_string());
        Ok(self)
    }

    pub fn tail(mut self, lines: u32) -> Self {
        self.tail = Some(lines);
        self
    }

    /// Assemble the command string. Everything here already passed the
    /// allow-list, so no further quoting is needed.
    pub fn build(self) -> String {
        let mut parts = vec!["kubectl".to_string(), self.verb.to_string(), self.resource];

        if let Some(name) = self.name {
            parts.push(name);
        }
        if self.all_namespaces {
            parts.push("--all-namespaces".to_string());
        } else if let Some(namespace) = self.namespace {
            parts.push("-n".to_string());
            parts.push(namespace);
        }
        if let Some(container) = self.container {
            parts.push("-c".to_string());
            parts.push(container);
        }
        if let Some(lines) = self.tail {
            parts.push(format!("--tail={}", lines));
        }
        if self.json {
            parts.push("-o".to_string());
            parts.push("json".to_string());
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_pods_in_namespace() {
        let command = KubectlCommand::get("pods")
            .unwrap()
            .namespace("kube-system")
            .unwrap()
            .build();
        assert_eq!(command, "kubectl get pods -n kube-system -o json");
    }

    #[test]
    fn get_single_pod() {
        let command = KubectlCommand::get("pods")
            .unwrap()
            .name("nginx-7f8b4")
            .unwrap()
            .namespace("default")
            .unwrap()
            .build();
        assert_eq!(command, "kubectl get pods nginx-7f8b4 -n default -o json");
    }

    #[test]
    fn get_all_namespaces() {
        let command = KubectlCommand::get("nodes").unwrap().all_namespaces().build();
        assert_eq!(command, "kubectl get nodes --all-namespaces -o json");
    }

    #[test]
    fn logs_with_container_and_tail() {
        let command = KubectlCommand::logs("nginx-7f8b4")
            .unwrap()
            .namespace("default")
            .unwrap()
            .container("sidecar")
            .unwrap()
            .tail(200)
            .build();
        assert_eq!(
            command,
            "kubectl logs nginx-7f8b4 -n default -c sidecar --tail=200"
        );
    }

    #[test]
    fn describe_has_no_json_output() {
        let command = KubectlCommand::describe("deployments.apps")
            .unwrap()
            .name("api")
            .unwrap()
            .build();
        assert_eq!(command, "kubectl describe deployments.apps api");
    }

    #[test]
    fn rejects_hostile_namespace() {
        assert!(
            KubectlCommand::get("pods")
                .unwrap()
                .namespace("default; rm -rf /")
                .is_err()
        );
    }

    #[test]
    fn rejects_hostile_pod_name() {
        assert!(KubectlCommand::logs("$(whoami)").is_err());
    }

    #[test]
    fn rejects_hostile_resource() {
        assert!(KubectlCommand::get("pods `id`").is_err());
    }
}
