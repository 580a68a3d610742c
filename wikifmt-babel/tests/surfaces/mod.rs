mod kitchensink;
mod registry;
