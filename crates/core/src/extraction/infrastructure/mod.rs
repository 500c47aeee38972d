pub mod extractor_factory;
