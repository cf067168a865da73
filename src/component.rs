//! The render capability.
//!
//! A component is whatever a page's component method returns: something that
//! can render itself for a request into a byte sink. The rendering
//! technology (templates, builders, plain strings) is up to the application.

use std::io;

use crate::server::Request;

pub trait Component {
    fn render(&self, req: &Request, sink: &mut dyn io::Write) -> anyhow::Result<()>;
}

impl Component for String {
    fn render(&self, _req: &Request, sink: &mut dyn io::Write) -> anyhow::Result<()> {
        sink.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl Component for &'static str {
    fn render(&self, _req: &Request, sink: &mut dyn io::Write) -> anyhow::Result<()> {
        sink.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl<C: Component + ?Sized> Component for Box<C> {
    fn render(&self, req: &Request, sink: &mut dyn io::Write) -> anyhow::Result<()> {
        (**self).render(req, sink)
    }
}

/// Return type of a component method: a [`Component`], or a `Result` whose
/// `Err` is reported as the method's failure.
pub trait IntoComponent: 'static {
    const FALLIBLE: bool = false;

    fn into_component(self) -> anyhow::Result<Box<dyn Component>>;
}

impl<C: Component + 'static> IntoComponent for C {
    fn into_component(self) -> anyhow::Result<Box<dyn Component>> {
        Ok(Box::new(self))
    }
}

impl<C, E> IntoComponent for Result<C, E>
where
    C: Component + 'static,
    E: Into<anyhow::Error> + 'static,
{
    const FALLIBLE: bool = true;

    fn into_component(self) -> anyhow::Result<Box<dyn Component>> {
        match self {
            Ok(component) => Ok(Box::new(component)),
            Err(error) => Err(error.into()),
        }
    }
}

/// A component backed by a closure.
pub struct RenderFn<F>(F);

pub fn render_fn<F>(f: F) -> RenderFn<F>
where
    F: Fn(&Request, &mut dyn io::Write) -> anyhow::Result<()>,
{
    RenderFn(f)
}

impl<F> Component for RenderFn<F>
where
    F: Fn(&Request, &mut dyn io::Write) -> anyhow::Result<()>,
{
    fn render(&self, req: &Request, sink: &mut dyn io::Write) -> anyhow::Result<()> {
        (self.0)(req, sink)
    }
}
