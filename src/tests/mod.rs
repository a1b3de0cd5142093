mod ring;
mod wifi;
