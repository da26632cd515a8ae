mod backings;
mod dependencies;
mod library_loading;
