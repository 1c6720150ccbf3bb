//! Given steps for cache deployment BDD scenarios.

use super::world::{CacheWorld, run_async};
use deckhand::configuration::services::CreateConfigurationRequest;
use deckhand::template::domain::{PortDeclaration, ServiceTemplate, TemplateId};
use eyre::WrapErr;
use rstest_bdd_macros::given;

fn template(id: &str, image: &str, port: &str) -> Result<ServiceTemplate, eyre::Report> {
    let template_id = TemplateId::new(id).wrap_err("template id")?;
    let declaration = PortDeclaration::parse(&template_id, port).wrap_err("port declaration")?;
    Ok(ServiceTemplate::new(template_id, image)
        .wrap_err("template")?
        .with_port(declaration))
}

#[given(r#"the "{id}" template with image "{image}" on port "{port}""#)]
fn template_loaded(
    world: &mut CacheWorld,
    id: String,
    image: String,
    port: String,
) -> Result<(), eyre::Report> {
    let loaded = template(&id, &image, &port)?;
    world
        .manager
        .store()
        .templates()
        .insert(loaded)
        .wrap_err("load template")?;
    Ok(())
}

#[given(r#"a "{id}" template requiring "{placeholder}" with image "{image}" on port "{port}""#)]
fn template_with_placeholder_loaded(
    world: &mut CacheWorld,
    id: String,
    placeholder: String,
    image: String,
    port: String,
) -> Result<(), eyre::Report> {
    let loaded = template(&id, &image, &port)?.with_placeholder(placeholder);
    world
        .manager
        .store()
        .templates()
        .insert(loaded)
        .wrap_err("load template")?;
    Ok(())
}

#[given(r#"a configuration "{id}" of template "{template}""#)]
fn configuration_created(
    world: &mut CacheWorld,
    id: String,
    template: String,
) -> Result<(), eyre::Report> {
    run_async(
        world
            .manager
            .store()
            .create(CreateConfigurationRequest::new(id, template)),
    )
    .wrap_err("create configuration")?;
    Ok(())
}
