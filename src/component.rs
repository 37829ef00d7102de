/// The caller-owned record that receives enrichment annotations.
///
/// This is the only seam between the request manager and the SBOM document
/// model: the core attaches name/value properties and presumes nothing else
/// about the component. Implement it on whatever your bill of materials uses
/// to describe a single artifact.
///
/// ```
/// use clearlydefined::Component;
///
/// #[derive(Default)]
/// struct BomComponent {
///     properties: Vec<(String, String)>,
/// }
///
/// impl Component for BomComponent {
///     fn add_property(&mut self, name: &str, value: &str) {
///         self.properties.push((name.into(), value.into()));
///     }
/// }
/// ```
pub trait Component: Send + 'static {
    /// Attach a name/value property to the component.
    fn add_property(&mut self, name: &str, value: &str);
}

/// Property-bag implementation for callers that only want the raw pairs.
impl Component for Vec<(String, String)> {
    fn add_property(&mut self, name: &str, value: &str) {
        self.push((name.to_owned(), value.to_owned()));
    }
}
