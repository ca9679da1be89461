use crate::definition::DefinitionError;
use crate::factory::ObjectFactory;
use crate::resource::Resource;

/// Parses object definitions out of a resource and registers them.
///
/// The XML parser lives outside this crate; contexts only depend on this
/// seam. The factory carries the case policy the reader must respect.
pub trait DefinitionReader: Send + Sync {
    /// Returns the number of definitions registered from `resource`.
    fn load_definitions(
        &self,
        resource: &dyn Resource,
        factory: &mut dyn ObjectFactory,
    ) -> Result<usize, DefinitionError>;
}
