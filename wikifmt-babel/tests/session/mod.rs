mod lifecycle;
mod selection;
