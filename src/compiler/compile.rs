//! Translation of a resolved configuration into backend artifacts.

use super::{
    Artifact, ClusterArtifactSet, CompileError, ConfigObject, ContainerArtifact, ExposedPort,
    ExposureDescriptor, HealthProbe, NamedPort, PortMapping, ResolvedConfiguration, SecretObject,
    VolumeMount, Workload,
    identifiers::{MAX_OBJECT_NAME_LENGTH, MAX_PORT_NAME_LENGTH, sanitize_identifier},
    is_secret_name,
};
use crate::configuration::domain::{BackendKind, DeploymentTarget};
use crate::template::domain::{
    HostPortError, PortDeclaration, TemplateError, resolve_image_variables,
    variables::{self, VariableError},
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const NAME_LABEL: &str = "app.kubernetes.io/name";
const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_PORT_NAME: &str = "http";

/// Compiles a resolved configuration for one backend kind.
///
/// Compilation is pure and deterministic: the same input always yields the
/// same artifact, so [`fingerprint`] of the output identifies it.
///
/// # Errors
///
/// Returns [`CompileError`] when a variable or placeholder is unresolved,
/// a token is malformed, a host port is invalid, an identifier cannot be
/// sanitized or two ports share a name.
pub fn compile(
    resolved: &ResolvedConfiguration,
    kind: BackendKind,
) -> Result<Artifact, CompileError> {
    let compiler = Compiler { resolved };
    let env = compiler.final_env()?;
    match kind {
        BackendKind::Container => compiler.container(env).map(Artifact::Container),
        BackendKind::Cluster => compiler.cluster(env).map(Artifact::Cluster),
    }
}

/// Returns the hex-encoded SHA-256 of the artifact's canonical JSON form.
///
/// # Errors
///
/// Returns [`CompileError::Serialize`] if the artifact cannot be serialized.
pub fn fingerprint(artifact: &Artifact) -> Result<String, CompileError> {
    let canonical =
        serde_json::to_vec(artifact).map_err(|error| CompileError::Serialize(Arc::new(error)))?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

struct Compiler<'a> {
    resolved: &'a ResolvedConfiguration,
}

impl Compiler<'_> {
    fn final_env(&self) -> Result<BTreeMap<String, String>, CompileError> {
        let resolved = self.resolved;
        for placeholder in resolved.template.placeholders() {
            let supplied = resolved
                .env
                .get(placeholder)
                .is_some_and(|value| !value.trim().is_empty());
            if !supplied {
                return Err(CompileError::UnresolvedVariable {
                    configuration_id: resolved.configuration_id.clone(),
                    name: placeholder.to_owned(),
                });
            }
        }

        let mut done = BTreeMap::new();
        for start in resolved.env.keys() {
            self.resolve_env_var(start, &mut done)?;
        }
        Ok(done)
    }

    /// Substitutes `start` after every env var it references, walking an
    /// explicit stack. A value that names its own variable reads the
    /// process environment for it.
    fn resolve_env_var(
        &self,
        start: &str,
        done: &mut BTreeMap<String, String>,
    ) -> Result<(), CompileError> {
        let env = &self.resolved.env;
        let mut stack: Vec<&str> = vec![start];

        while let Some(current) = stack.last().copied() {
            if done.contains_key(current) {
                stack.pop();
                continue;
            }
            let raw = env.get(current).map_or("", String::as_str);
            let pending = variables::referenced_names(raw)
                .map_err(|error| self.variable_error(error))?
                .into_iter()
                .find(|name| {
                    *name != current && env.contains_key(*name) && !done.contains_key(*name)
                });

            match pending {
                Some(name) if stack.contains(&name) => {
                    let mut chain: Vec<String> = stack
                        .iter()
                        .skip_while(|entry| **entry != name)
                        .map(|entry| (*entry).to_owned())
                        .collect();
                    chain.push(name.to_owned());
                    return Err(CompileError::CyclicVariable {
                        configuration_id: self.resolved.configuration_id.clone(),
                        chain,
                    });
                }
                Some(name) => stack.push(name),
                None => {
                    let value = self.substitute(raw, &[&*done, &self.resolved.ambient])?;
                    done.insert(current.to_owned(), value);
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    fn substitute(
        &self,
        input: &str,
        layers: &variables::VariableLayers<'_>,
    ) -> Result<String, CompileError> {
        variables::substitute(input, layers).map_err(|error| self.variable_error(error))
    }

    fn variable_error(&self, error: VariableError) -> CompileError {
        let configuration_id = self.resolved.configuration_id.clone();
        match error {
            VariableError::Malformed { raw } => CompileError::Parse {
                configuration_id,
                raw,
            },
            VariableError::Unresolved { name } => CompileError::UnresolvedVariable {
                configuration_id,
                name,
            },
        }
    }

    fn image(&self) -> Result<String, CompileError> {
        let resolved = self.resolved;
        let template = &resolved.template;
        resolve_image_variables(
            template.id(),
            template.image(),
            &resolved.overrides,
            &resolved.ambient,
        )
        .map_err(|error| {
            let configuration_id = resolved.configuration_id.clone();
            match error {
                TemplateError::UnresolvedVariable { name, .. } => {
                    CompileError::UnresolvedVariable {
                        configuration_id,
                        name,
                    }
                }
                TemplateError::Parse { raw, .. } => CompileError::Parse {
                    configuration_id,
                    raw,
                },
                other => CompileError::Parse {
                    configuration_id,
                    raw: other.to_string(),
                },
            }
        })
    }

    fn host_port(
        &self,
        declaration: &PortDeclaration,
        env: &BTreeMap<String, String>,
    ) -> Result<u16, CompileError> {
        declaration
            .resolve_host_port(env, &self.resolved.ambient)
            .map_err(|error| match error {
                HostPortError::Variable(variable) => self.variable_error(variable),
                HostPortError::NotAPort { value } => CompileError::InvalidPort {
                    configuration_id: self.resolved.configuration_id.clone(),
                    env_var: declaration.env_var().to_owned(),
                    value,
                },
            })
    }

    fn volumes(&self, env: &BTreeMap<String, String>) -> Result<Vec<VolumeMount>, CompileError> {
        self.resolved
            .template
            .volumes()
            .iter()
            .map(|volume| {
                Ok(VolumeMount {
                    source: self.substitute(volume.source(), &[env, &self.resolved.ambient])?,
                    target: volume.target().to_owned(),
                    read_only: volume.is_read_only(),
                })
            })
            .collect()
    }

    fn identifier(&self, raw: &str, max_length: usize, kind: &'static str) -> Result<String, CompileError> {
        sanitize_identifier(raw, max_length).ok_or_else(|| CompileError::InvalidIdentifier {
            configuration_id: self.resolved.configuration_id.clone(),
            value: raw.to_owned(),
            kind,
        })
    }

    fn labels(&self) -> Result<BTreeMap<String, String>, CompileError> {
        let resolved = self.resolved;
        Ok(BTreeMap::from([
            (
                NAME_LABEL.to_owned(),
                self.identifier(resolved.template.id().as_str(), MAX_OBJECT_NAME_LENGTH, "template")?,
            ),
            (INSTANCE_LABEL.to_owned(), self.base_name()?),
            (MANAGED_BY_LABEL.to_owned(), resolved.managed_by.clone()),
        ]))
    }

    fn base_name(&self) -> Result<String, CompileError> {
        self.identifier(
            self.resolved.configuration_id.as_str(),
            MAX_OBJECT_NAME_LENGTH,
            "object name",
        )
    }

    fn container(&self, env: BTreeMap<String, String>) -> Result<ContainerArtifact, CompileError> {
        let ports = self
            .resolved
            .template
            .ports()
            .iter()
            .map(|declaration| {
                Ok(PortMapping {
                    host_port: self.host_port(declaration, &env)?,
                    container_port: declaration.container_port(),
                    protocol: declaration.protocol(),
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(ContainerArtifact {
            name: self.base_name()?,
            image: self.image()?,
            ports,
            volumes: self.volumes(&env)?,
            restart_policy: self.resolved.restart_policy,
            labels: self.labels()?,
            env,
        })
    }

    fn cluster(&self, env: BTreeMap<String, String>) -> Result<ClusterArtifactSet, CompileError> {
        let resolved = self.resolved;
        let base = self.base_name()?;
        let namespace = match &resolved.target {
            DeploymentTarget::Cluster { namespace, .. } => {
                self.identifier(namespace, MAX_OBJECT_NAME_LENGTH, "namespace")?
            }
            DeploymentTarget::Local | DeploymentTarget::RemoteHost { .. } => {
                DEFAULT_NAMESPACE.to_owned()
            }
        };
        let config_name =
            self.identifier(&format!("{base}-config"), MAX_OBJECT_NAME_LENGTH, "object name")?;
        let secret_name =
            self.identifier(&format!("{base}-secrets"), MAX_OBJECT_NAME_LENGTH, "object name")?;
        let labels = self.labels()?;
        let image = self.image()?;
        let volumes = self.volumes(&env)?;

        let port_names = self.port_names()?;
        let declarations = resolved.template.ports();
        let named_ports: Vec<NamedPort> = declarations
            .iter()
            .zip(&port_names)
            .map(|(declaration, name)| NamedPort {
                name: name.clone(),
                container_port: declaration.container_port(),
                protocol: declaration.protocol(),
            })
            .collect();

        let probe = resolved
            .template
            .health_check_path()
            .zip(declarations.first())
            .map(|(path, declaration)| HealthProbe {
                path: path.to_owned(),
                port: declaration.container_port(),
            });

        let exposure = if named_ports.is_empty() {
            None
        } else {
            Some(self.exposure(&base, &labels, &named_ports, &env)?)
        };
        let (secret_data, config_data): (BTreeMap<_, _>, BTreeMap<_, _>) =
            env.into_iter().partition(|(name, _)| is_secret_name(name));

        Ok(ClusterArtifactSet {
            namespace,
            config_object: ConfigObject {
                name: config_name.clone(),
                data: config_data,
            },
            secret_object: SecretObject {
                name: secret_name.clone(),
                data: secret_data,
            },
            workload: Workload {
                name: base,
                image,
                replicas: 1,
                labels,
                env_from: vec![config_name, secret_name],
                ports: named_ports,
                probe,
                volumes,
            },
            exposure,
        })
    }

    fn exposure(
        &self,
        base: &str,
        selector: &BTreeMap<String, String>,
        named_ports: &[NamedPort],
        env: &BTreeMap<String, String>,
    ) -> Result<ExposureDescriptor, CompileError> {
        let mode = self.resolved.template.exposure();
        let ports = self
            .resolved
            .template
            .ports()
            .iter()
            .zip(named_ports)
            .map(|(declaration, named)| {
                let port = if mode.is_externally_addressable() {
                    self.host_port(declaration, env)?
                } else {
                    declaration.container_port()
                };
                Ok(ExposedPort {
                    name: named.name.clone(),
                    port,
                    target_port: named.container_port,
                    protocol: named.protocol,
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(ExposureDescriptor {
            name: base.to_owned(),
            mode,
            selector: selector.clone(),
            ports,
        })
    }

    /// Names every declared port: explicit names are sanitized, the rest
    /// take `http`, `http-2` and so on, skipping names already in use.
    fn port_names(&self) -> Result<Vec<String>, CompileError> {
        let declarations = self.resolved.template.ports();
        let explicit = declarations
            .iter()
            .map(|declaration| {
                declaration
                    .name()
                    .map(|name| self.identifier(name, MAX_PORT_NAME_LENGTH, "port name"))
                    .transpose()
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        let mut taken = BTreeSet::new();
        for name in explicit.iter().flatten() {
            if !taken.insert(name.clone()) {
                return Err(CompileError::DuplicatePortName {
                    configuration_id: self.resolved.configuration_id.clone(),
                    name: name.clone(),
                });
            }
        }

        let mut ordinal = 1_usize;
        let mut names = Vec::with_capacity(explicit.len());
        for name in explicit {
            if let Some(explicit_name) = name {
                names.push(explicit_name);
                continue;
            }
            let generated = loop {
                let candidate = if ordinal == 1 {
                    DEFAULT_PORT_NAME.to_owned()
                } else {
                    format!("{DEFAULT_PORT_NAME}-{ordinal}")
                };
                ordinal += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(generated.clone());
            names.push(generated);
        }
        Ok(names)
    }
}
