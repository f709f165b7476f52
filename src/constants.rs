// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision; the core does as much of its
geometry and statistics in double precision as possible before any lower
precision is ever required.
*/

/// Default `ASSOCIATION_RADIUS`, arcsec, for the `basic` method.
pub const DEFAULT_ASSOCIATION_RADIUS_ARCSEC: f64 = 5.0;

/// Default `ASSOCIATION_DE_RUITER_RADIUS` for the `deruiter` method.
pub const DEFAULT_DE_RUITER_RADIUS: f64 = 5.68;

/// Default `ASSOCIATION_BEAMWIDTH_LIMIT` multiplier.
pub const DEFAULT_BEAMWIDTH_LIMIT: f64 = 1.5;

/// Default `FLUX_PERC_ERROR` fraction.
pub const DEFAULT_FLUX_PERC_ERROR: f64 = 0.05;

/// Default `DUPLICATE_LIMIT`, arcsec.
pub const DEFAULT_DUPLICATE_LIMIT_ARCSEC: f64 = 2.5;

/// Default `MIN_NEW_SOURCE_SIGMA`.
pub const DEFAULT_MIN_NEW_SOURCE_SIGMA: f64 = 5.0;

/// Default `ASTROMETRIC_UNCERTAINTY_RA`/`_DEC`, arcsec.
pub const DEFAULT_ASTROMETRIC_UNCERTAINTY_ARCSEC: f64 = 0.0;
